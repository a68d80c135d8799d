//! Embedded chat page.

pub const INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>docchat</title>
<style>
  body { font-family: system-ui, sans-serif; margin: 0; background: #f5f5f4; color: #1c1917; }
  main { max-width: 52rem; margin: 0 auto; padding: 1rem; display: flex; flex-direction: column; height: 100vh; box-sizing: border-box; }
  h1 { font-size: 1.25rem; margin: 0 0 .75rem; }
  #log { flex: 1; overflow-y: auto; background: #fff; border: 1px solid #d6d3d1; border-radius: .5rem; padding: .75rem; }
  .turn { margin-bottom: 1rem; }
  .q { font-weight: 600; }
  .a { white-space: pre-wrap; margin-top: .25rem; }
  .meta { color: #78716c; font-size: .8rem; margin-top: .25rem; }
  .err { color: #b91c1c; white-space: pre-wrap; }
  form { display: flex; gap: .5rem; margin-top: .75rem; }
  input { flex: 1; padding: .6rem; border: 1px solid #a8a29e; border-radius: .4rem; font-size: 1rem; }
  button { padding: .6rem 1rem; border: 0; border-radius: .4rem; background: #1c1917; color: #fff; cursor: pointer; }
  button:disabled { opacity: .5; cursor: wait; }
</style>
</head>
<body>
<main>
  <h1>docchat</h1>
  <div id="log"></div>
  <form id="form">
    <input id="question" autocomplete="off" placeholder="Ask about your documents" autofocus>
    <button id="send" type="submit">Ask</button>
    <button id="reset" type="button">New session</button>
  </form>
</main>
<script>
  let sessionId = null;
  const log = document.getElementById("log");
  const form = document.getElementById("form");
  const input = document.getElementById("question");
  const send = document.getElementById("send");

  function append(cls, text) {
    const el = document.createElement("div");
    el.className = cls;
    el.textContent = text;
    return el;
  }

  form.addEventListener("submit", async (event) => {
    event.preventDefault();
    const question = input.value.trim();
    if (!question) return;
    input.value = "";
    send.disabled = true;

    const turn = document.createElement("div");
    turn.className = "turn";
    turn.appendChild(append("q", question));
    log.appendChild(turn);

    try {
      const res = await fetch("/api/chat", {
        method: "POST",
        headers: { "Content-Type": "application/json" },
        body: JSON.stringify({ question, session_id: sessionId }),
      });
      const body = await res.json();
      if (body.session_id) sessionId = body.session_id;
      if (res.ok) {
        turn.appendChild(append("a", body.text));
        turn.appendChild(append("meta", body.latency_secs.toFixed(2) + "s"));
      } else {
        turn.appendChild(append("err", "Error: " + body.error));
      }
    } catch (err) {
      turn.appendChild(append("err", "Error: " + err));
    } finally {
      send.disabled = false;
      log.scrollTop = log.scrollHeight;
      input.focus();
    }
  });

  document.getElementById("reset").addEventListener("click", async () => {
    if (sessionId) {
      await fetch("/api/sessions/" + encodeURIComponent(sessionId), { method: "DELETE" });
    }
    sessionId = null;
    log.innerHTML = "";
  });
</script>
</body>
</html>
"#;
