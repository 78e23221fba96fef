use crate::stats::TimePolicy;
use chrono::Weekday;

pub fn render_index(policy: &TimePolicy) -> String {
    let week_start = match policy.week_start {
        Weekday::Sun => "Sunday",
        _ => "Monday",
    };
    INDEX_HTML
        .replace("{{OFFSET}}", &policy.offset.to_string())
        .replace("{{WEEK_START}}", week_start)
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>LAMS</title>
  <style>
    :root {
      --bg: #eef2f0;
      --ink: #1f2a2e;
      --muted: #66737a;
      --accent: #2a9d8f;
      --accent-2: #264653;
      --warn: #e76f51;
      --card: #ffffff;
      --shadow: 0 18px 40px rgba(38, 70, 83, 0.14);
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: linear-gradient(160deg, var(--bg), #dfe9e6 70%);
      color: var(--ink);
      font-family: "Segoe UI", "Hiragino Sans", sans-serif;
      padding: 28px 16px 48px;
    }

    .app {
      width: min(960px, 100%);
      margin: 0 auto;
      display: grid;
      gap: 24px;
    }

    header h1 {
      margin: 0;
      font-size: clamp(1.8rem, 4vw, 2.4rem);
    }

    .subtitle {
      margin: 4px 0 0;
      color: var(--muted);
    }

    .nav {
      display: flex;
      gap: 6px;
      padding: 6px;
      background: rgba(38, 70, 83, 0.08);
      border-radius: 999px;
      width: fit-content;
    }

    .nav button,
    .tabs button {
      background: transparent;
      border: none;
      border-radius: 999px;
      padding: 8px 16px;
      font-weight: 600;
      color: var(--muted);
      cursor: pointer;
    }

    .nav button.active,
    .tabs button.active {
      background: white;
      color: var(--accent-2);
      box-shadow: 0 6px 14px rgba(38, 70, 83, 0.12);
    }

    .card {
      background: var(--card);
      border-radius: 20px;
      padding: 24px;
      box-shadow: var(--shadow);
      display: grid;
      gap: 18px;
    }

    .hidden {
      display: none;
    }

    .grade h2 {
      margin: 0 0 8px;
      font-size: 1.3rem;
      border-bottom: 1px solid rgba(38, 70, 83, 0.12);
      padding-bottom: 6px;
    }

    .names {
      display: flex;
      flex-wrap: wrap;
      gap: 10px;
    }

    .name {
      border: 1px solid rgba(38, 70, 83, 0.25);
      background: white;
      border-radius: 12px;
      padding: 12px 18px;
      font-size: 1.3rem;
      cursor: pointer;
      min-width: 7em;
    }

    .name.present {
      border-color: var(--accent);
      background: rgba(42, 157, 143, 0.12);
    }

    dialog {
      border: none;
      border-radius: 20px;
      padding: 24px;
      box-shadow: var(--shadow);
      min-width: min(420px, 90vw);
    }

    dialog .actions {
      display: flex;
      gap: 12px;
      margin-top: 16px;
    }

    .primary,
    .secondary,
    .danger {
      border: none;
      border-radius: 999px;
      padding: 12px 20px;
      font-size: 1rem;
      font-weight: 600;
      cursor: pointer;
      color: white;
    }

    .primary { background: var(--accent); }
    .secondary { background: var(--accent-2); }
    .danger { background: var(--warn); }

    .chart-header {
      display: flex;
      flex-wrap: wrap;
      justify-content: space-between;
      align-items: center;
      gap: 12px;
    }

    .tabs {
      display: flex;
      gap: 6px;
      padding: 6px;
      background: rgba(38, 70, 83, 0.08);
      border-radius: 999px;
    }

    #chart {
      width: 100%;
      height: 280px;
      display: block;
    }

    .bar {
      fill: var(--accent);
    }

    .chart-grid {
      stroke: rgba(38, 70, 83, 0.12);
    }

    .chart-label {
      fill: var(--muted);
      font-size: 11px;
    }

    form {
      display: grid;
      gap: 10px;
    }

    label {
      display: grid;
      gap: 4px;
      font-size: 0.9rem;
      color: var(--muted);
    }

    input,
    select {
      font: inherit;
      padding: 8px 10px;
      border-radius: 10px;
      border: 1px solid rgba(38, 70, 83, 0.25);
    }

    .status {
      min-height: 1.2em;
      color: var(--muted);
    }

    .status[data-type="error"] { color: #c0392b; }
    .status[data-type="ok"] { color: #2d7a4b; }

    .hint {
      margin: 0;
      font-size: 0.9rem;
      color: var(--muted);
    }
  </style>
</head>
<body>
  <main class="app">
    <header>
      <h1>Lab Attendance</h1>
      <p class="subtitle">Tap your name to check in or out.</p>
    </header>

    <nav class="nav" role="tablist">
      <button class="active" type="button" data-view="roster">Attendance</button>
      <button type="button" data-view="dashboard">Dashboard</button>
      <button type="button" data-view="admin">Admin</button>
    </nav>

    <section id="view-roster" class="card">
      <div id="roster"></div>
    </section>

    <section id="view-dashboard" class="card hidden">
      <div class="chart-header">
        <label>Student
          <select id="stats-student"></select>
        </label>
        <div class="tabs" role="tablist">
          <button class="active" type="button" data-granularity="weekly">Week</button>
          <button type="button" data-granularity="monthly">Month</button>
          <button type="button" data-granularity="yearly">Year</button>
        </div>
      </div>
      <svg id="chart" viewBox="0 0 640 280" aria-label="Worked hours" role="img"></svg>
      <p class="hint" id="stats-total"></p>
    </section>

    <section id="view-admin" class="card hidden">
      <label>Admin password
        <input id="admin-password" type="password" autocomplete="off" />
      </label>

      <form id="settings-form">
        <strong>Record store</strong>
        <label>Endpoint <input name="endpoint" type="url" required /></label>
        <label>Access key <input name="access_key" type="text" required /></label>
        <button class="secondary" type="submit">Update settings</button>
      </form>

      <form id="add-form">
        <strong>Add student</strong>
        <label>Grade
          <select name="grade" required>
            <option value="M2">M2</option>
            <option value="M1">M1</option>
            <option value="B4">B4</option>
          </select>
        </label>
        <label>Name <input name="name" type="text" required /></label>
        <button class="primary" type="submit">Add student</button>
      </form>

      <form id="delete-form">
        <strong>Delete student</strong>
        <label>Grade
          <select name="grade" required>
            <option value="M2">M2</option>
            <option value="M1">M1</option>
            <option value="B4">B4</option>
          </select>
        </label>
        <label>Name <input name="name" type="text" required /></label>
        <button class="danger" type="submit">Delete student</button>
      </form>

      <button class="danger" id="delete-all" type="button">Delete all students</button>
    </section>

    <div class="status" id="status"></div>
    <p class="hint">Hours are counted in UTC{{OFFSET}}; weeks start on {{WEEK_START}}.</p>
  </main>

  <dialog id="check-dialog">
    <h2 id="dialog-name"></h2>
    <p>Choose check in or check out.</p>
    <div class="actions">
      <button class="primary" type="button" data-kind="check_in">Check in</button>
      <button class="secondary" type="button" data-kind="check_out">Check out</button>
      <button type="button" id="dialog-close">Cancel</button>
    </div>
  </dialog>

  <script>
    const POLL_MS = 10000;
    const rosterEl = document.getElementById('roster');
    const statusEl = document.getElementById('status');
    const dialog = document.getElementById('check-dialog');
    const dialogName = document.getElementById('dialog-name');
    const studentSelect = document.getElementById('stats-student');
    const chartEl = document.getElementById('chart');
    const totalEl = document.getElementById('stats-total');
    const passwordEl = document.getElementById('admin-password');

    let selected = null;
    let granularity = 'weekly';
    let statsRequest = 0;

    const setStatus = (message, type) => {
      statusEl.textContent = message;
      statusEl.dataset.type = type || '';
    };

    const request = async (method, url, body, admin) => {
      const headers = {};
      if (body !== undefined) {
        headers['content-type'] = 'application/json';
      }
      if (admin) {
        headers['x-admin-password'] = passwordEl.value;
      }
      const res = await fetch(url, {
        method,
        headers,
        body: body === undefined ? undefined : JSON.stringify(body)
      });
      if (!res.ok) {
        const msg = await res.text();
        throw new Error(msg || `Request failed (${res.status})`);
      }
      return res.json();
    };

    const renderRoster = (data) => {
      rosterEl.innerHTML = '';
      const options = [];
      data.sections.forEach((section) => {
        if (!section.students.length) {
          return;
        }
        const block = document.createElement('div');
        block.className = 'grade';
        const title = document.createElement('h2');
        title.textContent = section.grade;
        const names = document.createElement('div');
        names.className = 'names';
        section.students.forEach((student) => {
          const button = document.createElement('button');
          button.type = 'button';
          button.className = student.present ? 'name present' : 'name';
          button.textContent = student.name;
          button.addEventListener('click', () => {
            selected = student;
            dialogName.textContent = student.name;
            dialog.showModal();
          });
          names.appendChild(button);
          options.push(`<option value="${student.id}">${section.grade} ${student.name}</option>`);
        });
        block.append(title, names);
        rosterEl.appendChild(block);
      });
      if (!rosterEl.children.length) {
        rosterEl.textContent = 'No students yet. Add some from the Admin tab.';
      }
      const current = studentSelect.value;
      studentSelect.innerHTML = options.join('');
      if (current) {
        studentSelect.value = current;
      }
    };

    const loadRoster = async () => {
      renderRoster(await request('GET', '/api/students'));
    };

    const renderBars = (buckets) => {
      const width = 640;
      const height = 280;
      const padX = 40;
      const padY = 30;
      const top = 16;
      const max = Math.max(1, ...buckets.map((bucket) => bucket.hours));
      const slot = (width - padX * 2) / buckets.length;
      const scale = (height - top - padY) / max;
      let svg = '';
      for (let i = 0; i <= 4; i += 1) {
        const value = (max * i) / 4;
        const y = height - padY - value * scale;
        svg += `<line class="chart-grid" x1="${padX}" y1="${y}" x2="${width - padX}" y2="${y}" />`;
        svg += `<text class="chart-label" x="${padX - 6}" y="${y + 4}" text-anchor="end">${value.toFixed(1)}</text>`;
      }
      const labelEvery = buckets.length > 12 ? 3 : 1;
      buckets.forEach((bucket, index) => {
        const barHeight = bucket.hours * scale;
        const x = padX + index * slot + slot * 0.15;
        svg += `<rect class="bar" x="${x}" y="${height - padY - barHeight}" width="${slot * 0.7}" height="${barHeight}" rx="3" />`;
        if (index % labelEvery === 0) {
          svg += `<text class="chart-label" x="${x + slot * 0.35}" y="${height - padY + 16}" text-anchor="middle">${bucket.bucket_key}</text>`;
        }
      });
      chartEl.innerHTML = svg;
      const total = buckets.reduce((sum, bucket) => sum + bucket.hours, 0);
      totalEl.textContent = `Total: ${total.toFixed(1)} h`;
    };

    const loadStats = async () => {
      const id = studentSelect.value;
      if (!id) {
        chartEl.innerHTML = '<text class="chart-label" x="50%" y="50%" text-anchor="middle">No student selected</text>';
        totalEl.textContent = '';
        return;
      }
      const ticket = ++statsRequest;
      const data = await request('GET', `/api/students/${id}/stats?granularity=${granularity}`);
      if (ticket !== statsRequest) {
        return;
      }
      renderBars(data[granularity]);
    };

    const refresh = () => {
      loadRoster()
        .then(loadStats)
        .catch((err) => setStatus(err.message, 'error'));
    };

    document.querySelectorAll('.nav button').forEach((button) => {
      button.addEventListener('click', () => {
        document.querySelectorAll('.nav button').forEach((other) => other.classList.remove('active'));
        button.classList.add('active');
        ['roster', 'dashboard', 'admin'].forEach((view) => {
          document.getElementById(`view-${view}`).classList.toggle('hidden', view !== button.dataset.view);
        });
      });
    });

    document.querySelectorAll('.tabs button').forEach((button) => {
      button.addEventListener('click', () => {
        document.querySelectorAll('.tabs button').forEach((other) => other.classList.remove('active'));
        button.classList.add('active');
        granularity = button.dataset.granularity;
        loadStats().catch((err) => setStatus(err.message, 'error'));
      });
    });

    studentSelect.addEventListener('change', () => {
      loadStats().catch((err) => setStatus(err.message, 'error'));
    });

    dialog.querySelectorAll('[data-kind]').forEach((button) => {
      button.addEventListener('click', async () => {
        const kind = button.dataset.kind;
        try {
          await request('POST', '/api/attendance', { student_id: selected.id, kind });
          setStatus(`${selected.name}: ${kind === 'check_in' ? 'checked in' : 'checked out'}`, 'ok');
          dialog.close();
          refresh();
        } catch (err) {
          setStatus(err.message, 'error');
        }
      });
    });

    document.getElementById('dialog-close').addEventListener('click', () => dialog.close());

    const formValues = (form) => Object.fromEntries(new FormData(form).entries());

    document.getElementById('settings-form').addEventListener('submit', (event) => {
      event.preventDefault();
      request('PUT', '/api/admin/settings', formValues(event.target), true)
        .then(() => {
          setStatus('Settings updated', 'ok');
          refresh();
        })
        .catch((err) => setStatus(err.message, 'error'));
    });

    document.getElementById('add-form').addEventListener('submit', (event) => {
      event.preventDefault();
      request('POST', '/api/students', formValues(event.target), true)
        .then((student) => {
          event.target.reset();
          setStatus(`Added ${student.name}`, 'ok');
          refresh();
        })
        .catch((err) => setStatus(err.message, 'error'));
    });

    document.getElementById('delete-form').addEventListener('submit', (event) => {
      event.preventDefault();
      const values = formValues(event.target);
      if (!window.confirm(`Delete ${values.name} from ${values.grade}?`)) {
        return;
      }
      request('DELETE', '/api/students', values, true)
        .then(() => {
          event.target.reset();
          setStatus(`Deleted ${values.name}`, 'ok');
          refresh();
        })
        .catch((err) => setStatus(err.message, 'error'));
    });

    document.getElementById('delete-all').addEventListener('click', () => {
      if (!window.confirm('Delete all students? This cannot be undone.')) {
        return;
      }
      request('DELETE', '/api/students/all', undefined, true)
        .then((result) => {
          setStatus(`Deleted ${result.deleted} students`, 'ok');
          refresh();
        })
        .catch((err) => setStatus(err.message, 'error'));
    });

    refresh();
    setInterval(refresh, POLL_MS);
  </script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_reports_time_policy() {
        let page = render_index(&TimePolicy::default());
        assert!(page.contains("UTC+09:00"));
        assert!(page.contains("weeks start on Monday"));
        assert!(!page.contains("{{"));
    }
}
