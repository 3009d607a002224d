use axum::response::Html;

use crate::agent::Phase;
use crate::server::handler::BUSY_MESSAGE;

const PHASES_PLACEHOLDER: &str = "__PHASE_LABELS__";
const BUSY_PLACEHOLDER: &str = "__BUSY_MESSAGE__";

const INDEX_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>delve</title>
  <style>
    body { font-family: sans-serif; max-width: 800px; margin: 0 auto; padding: 20px; }
    h1 { color: #333; border-bottom: 2px solid #eee; padding-bottom: 10px; }
    .search-container { margin-bottom: 20px; }
    input[type="text"] { width: 70%; padding: 10px; font-size: 16px; border: 1px solid #ddd; border-radius: 4px; }
    button { padding: 10px 15px; background-color: #0066cc; color: white; border: none; border-radius: 4px; cursor: pointer; font-size: 16px; }
    button:hover { background-color: #0055aa; }
    button:disabled { background-color: #cccccc; cursor: not-allowed; }
    #status { margin: 10px 0; padding: 10px; background-color: #f8f8f8; border-left: 4px solid #0066cc; display: none; }
    #status.error { border-left-color: #cc3300; }
    #notice { margin: 10px 0; color: #996600; font-size: 0.9em; display: none; }
    #result { margin-top: 20px; white-space: pre-wrap; background-color: #f8f8f8; padding: 15px; border-radius: 4px; line-height: 1.5; }
    .loading { display: inline-block; width: 20px; height: 20px; border: 3px solid rgba(0,0,0,.3); border-radius: 50%;
               border-top-color: #0066cc; animation: spin 1s ease-in-out infinite; margin-right: 10px; vertical-align: middle; }
    @keyframes spin { to { transform: rotate(360deg); } }
    .phases { margin-top: 10px; font-size: 0.9em; color: #666; }
    .phase { opacity: 0.6; margin-right: 8px; }
    .phase.active { opacity: 1; font-weight: bold; color: #0066cc; }
  </style>
</head>
<body>
  <h1>delve: deep research</h1>
  <div class="search-container">
    <input type="text" id="query" placeholder="What do you want to research?" autofocus>
    <button id="search-btn">Start research</button>
  </div>
  <div id="status"></div>
  <div id="notice"></div>
  <div id="result"></div>

  <script>
    const queryInput = document.getElementById('query');
    const searchBtn = document.getElementById('search-btn');
    const statusDiv = document.getElementById('status');
    const resultDiv = document.getElementById('result');
    const noticeDiv = document.getElementById('notice');
    const phases = __PHASE_LABELS__;
    const busyMessage = __BUSY_MESSAGE__;

    let socket = null;
    let currentPhase = 0;

    function phasesHtml(active) {
      return '<div class="phases">' + phases.map((label, i) =>
        `<span class="${i === active ? 'phase active' : 'phase'}">${label}</span>`).join('') + '</div>';
    }

    function updateStatus() {
      statusDiv.classList.remove('error');
      statusDiv.innerHTML = `<div class="loading"></div> Researching...<br>Current step: ${phases[currentPhase]}${phasesHtml(currentPhase)}`;
    }

    // Leaves the running search's status and button alone.
    function showNotice(message) {
      noticeDiv.textContent = message;
      noticeDiv.style.display = 'block';
      setTimeout(() => { noticeDiv.style.display = 'none'; }, 3000);
    }

    function showError(message) {
      statusDiv.classList.add('error');
      statusDiv.style.display = 'block';
      statusDiv.textContent = 'Error: ' + message;
      searchBtn.disabled = false;
    }

    function connect() {
      const protocol = window.location.protocol === 'https:' ? 'wss:' : 'ws:';
      socket = new WebSocket(`${protocol}//${window.location.host}/ws`);

      socket.onmessage = (event) => {
        let data;
        try {
          data = JSON.parse(event.data);
        } catch (e) {
          data = null;
        }
        if (!data || typeof data !== 'object' || !data.type) {
          resultDiv.textContent += event.data;
          window.scrollTo(0, document.body.scrollHeight);
          return;
        }

        switch (data.type) {
          case 'phase_update':
            currentPhase = data.phase;
            updateStatus();
            break;
          case 'search_complete':
            statusDiv.textContent = '✓ Research complete';
            searchBtn.disabled = false;
            setTimeout(() => { statusDiv.style.display = 'none'; }, 3000);
            break;
          case 'error':
            if (data.message === busyMessage) {
              showNotice(data.message);
            } else {
              showError(data.message);
            }
            break;
          default:
            break;
        }
      };

      socket.onclose = () => setTimeout(connect, 3000);
      socket.onerror = (error) => console.error('WebSocket error:', error);
    }

    connect();

    queryInput.addEventListener('keyup', (event) => {
      if (event.key === 'Enter') searchBtn.click();
    });

    searchBtn.addEventListener('click', () => {
      const query = queryInput.value.trim();
      if (!query) return;

      if (!socket || socket.readyState !== WebSocket.OPEN) {
        showError('Not connected to the server. Reload the page.');
        return;
      }

      searchBtn.disabled = true;
      currentPhase = 0;
      updateStatus();
      statusDiv.style.display = 'block';
      resultDiv.textContent = '';
      socket.send(JSON.stringify({ type: 'search', query }));
    });
  </script>
</body>
</html>
"#;

pub fn render_index() -> String {
    let labels: Vec<&str> = Phase::ALL.iter().map(|p| p.label()).collect();
    let labels = serde_json::to_string(&labels).unwrap_or_else(|_| "[]".to_string());
    let busy = serde_json::to_string(BUSY_MESSAGE).unwrap_or_else(|_| "null".to_string());
    INDEX_TEMPLATE
        .replace(PHASES_PLACEHOLDER, &labels)
        .replace(BUSY_PLACEHOLDER, &busy)
}

pub async fn index() -> Html<String> {
    Html(render_index())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_lists_every_phase_in_order() {
        let page = render_index();
        assert!(!page.contains(PHASES_PLACEHOLDER));

        let positions: Vec<usize> = Phase::ALL
            .iter()
            .map(|p| page.find(&format!("\"{}\"", p.label())).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(page.contains("'/ws'") || page.contains("/ws`"));
    }

    #[test]
    fn busy_rejection_is_a_notice_not_a_failure() {
        let page = render_index();
        assert!(!page.contains(BUSY_PLACEHOLDER));
        assert!(page.contains(&format!("const busyMessage = \"{}\";", BUSY_MESSAGE)));

        let branch = page.find("data.message === busyMessage").unwrap();
        let notice = page[branch..].find("showNotice(data.message)").unwrap();
        let error = page[branch..].find("showError(data.message)").unwrap();
        assert!(notice < error);

        let body = page.find("function showNotice").unwrap();
        let end = page[body..].find("function showError").unwrap();
        let notice_fn = &page[body..body + end];
        assert!(!notice_fn.contains("searchBtn"));
        assert!(!notice_fn.contains("statusDiv"));
    }
}
