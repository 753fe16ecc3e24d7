use axum::response::Html;

pub async fn index() -> Html<&'static str> {
    Html(
        r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>OctoMerge</title>
    <style>
        * {
            margin: 0;
            padding: 0;
            box-sizing: border-box;
        }

        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Oxygen, Ubuntu, Cantarell, sans-serif;
            background: linear-gradient(135deg, #0f1b3d 0%, #1f4fd1 100%);
            min-height: 100vh;
            padding: 20px;
        }

        .container {
            background: white;
            border-radius: 20px;
            box-shadow: 0 20px 60px rgba(0,0,0,0.3);
            max-width: 1200px;
            margin: 0 auto;
            padding: 40px;
        }

        header {
            display: flex;
            align-items: center;
            gap: 30px;
            margin-bottom: 30px;
        }

        header img {
            width: 300px;
            max-width: 35%;
        }

        h1 {
            color: #333;
            font-size: 2em;
        }

        .subtitle {
            color: #c77700;
            font-size: 0.9em;
            margin-top: 6px;
        }

        .presets {
            display: grid;
            grid-template-columns: repeat(4, 1fr);
            gap: 16px;
            margin-bottom: 30px;
        }

        .preset {
            border: 3px solid transparent;
            border-radius: 12px;
            padding: 8px;
            cursor: pointer;
            text-align: center;
            background: #f8f9ff;
            transition: all 0.2s;
        }

        .preset img {
            width: 100%;
            border-radius: 8px;
            aspect-ratio: 1;
            object-fit: cover;
            background: #e8ebff;
        }

        .preset.selected {
            border-color: #1f4fd1;
        }

        .preset-caption {
            color: #333;
            font-weight: 600;
            margin-top: 6px;
        }

        .upload-area {
            border: 3px dashed #1f4fd1;
            border-radius: 15px;
            padding: 40px 20px;
            text-align: center;
            cursor: pointer;
            background: #f8f9ff;
            transition: all 0.3s;
        }

        .upload-area.dragover {
            border-color: #0f1b3d;
            background: #e8ebff;
        }

        .upload-text {
            color: #1f4fd1;
            font-size: 1.2em;
            font-weight: 600;
            margin-bottom: 10px;
        }

        .upload-hint {
            color: #999;
            font-size: 0.9em;
        }

        input[type="file"] {
            display: none;
        }

        .thumbs {
            display: flex;
            flex-wrap: wrap;
            gap: 10px;
            margin: 20px 0;
        }

        .thumbs img {
            width: 128px;
            border-radius: 8px;
            box-shadow: 0 4px 15px rgba(0,0,0,0.1);
        }

        button {
            background: #1f4fd1;
            color: white;
            border: none;
            border-radius: 10px;
            padding: 12px 28px;
            font-size: 1.1em;
            font-weight: 600;
            cursor: pointer;
        }

        button:disabled {
            background: #aab;
            cursor: not-allowed;
        }

        .progress {
            margin-top: 20px;
            display: none;
        }

        .progress-track {
            background: #eef;
            border-radius: 8px;
            height: 12px;
            overflow: hidden;
        }

        .progress-bar {
            background: #1f4fd1;
            height: 100%;
            width: 0;
            transition: width 0.2s;
        }

        .progress-label {
            color: #666;
            font-size: 0.9em;
            margin-bottom: 6px;
        }

        .summary {
            margin-top: 20px;
            color: #333;
        }

        .gallery {
            display: grid;
            gap: 16px;
            margin-top: 20px;
        }

        .gallery img {
            width: 100%;
            border-radius: 10px;
        }

        .gallery .empty {
            border: 2px dashed #ccd;
            border-radius: 10px;
            aspect-ratio: 1;
        }

        .error {
            background: #fee;
            border: 2px solid #fcc;
            color: #c33;
            padding: 15px;
            border-radius: 10px;
            margin-top: 20px;
            display: none;
        }

        footer {
            display: grid;
            grid-template-columns: repeat(3, 1fr);
            gap: 20px;
            margin-top: 40px;
            padding-top: 30px;
            border-top: 2px solid #f0f0f0;
            font-size: 0.85em;
            color: #666;
        }

        a {
            color: #1f4fd1;
        }
    </style>
</head>
<body>
    <div class="container">
        <header>
            <img src="/assets/octoai_electric_blue.png" alt="OctoAI">
            <div>
                <h1>OctoMerge Preview</h1>
                <p class="subtitle">⚠️ Internal Version (OctoML Only)</p>
            </div>
        </header>

        <div class="presets" id="presets"></div>

        <div class="upload-area" id="uploadArea">
            <div class="upload-text">Upload photos</div>
            <div class="upload-hint">PNG or JPEG • several files at once</div>
            <input type="file" id="fileInput" accept=".png,.jpg,.jpeg,image/png,image/jpeg" multiple>
        </div>

        <div class="thumbs" id="thumbs"></div>

        <button id="mergeButton" disabled>OctoMerge!</button>

        <div class="progress" id="progress">
            <div class="progress-label" id="progressLabel"></div>
            <div class="progress-track"><div class="progress-bar" id="progressBar"></div></div>
        </div>

        <div class="error" id="error"></div>
        <div class="summary" id="summary"></div>
        <div class="gallery" id="gallery"></div>

        <footer>
            <div>👍 👎 Give us your <a href="https://forms.gle/7sfoQDjXt2SNjmp86">feedback</a> to help us improve OctoMerge! Or join our discord <a href="https://discord.com/invite/rXTPeRBcG7">here</a> and hop on to the #octomerge channel to provide feedback or ask questions.</div>
            <div>🐛 Report bugs, issues, or problematic content <a href="https://forms.gle/vWVAXa8CU7wXPGcq6">here</a>!</div>
            <div>⚠️ <strong>Disclaimer</strong> OctoMerge is built on the foundation of CLIP Interrogator, SDXL, LLAMA2, and is therefore likely to carry forward the potential dangers inherent in these base models.</div>
        </footer>
    </div>

    <script>
        const presetsDiv = document.getElementById('presets');
        const uploadArea = document.getElementById('uploadArea');
        const fileInput = document.getElementById('fileInput');
        const thumbs = document.getElementById('thumbs');
        const mergeButton = document.getElementById('mergeButton');
        const progress = document.getElementById('progress');
        const progressLabel = document.getElementById('progressLabel');
        const progressBar = document.getElementById('progressBar');
        const errorDiv = document.getElementById('error');
        const summary = document.getElementById('summary');
        const gallery = document.getElementById('gallery');

        let sessionId = null;
        let imageCount = 0;
        let merging = false;

        function api(path, options) {
            return fetch('/api/sessions/' + sessionId + path, options).then(async (response) => {
                const body = await response.json().catch(() => ({}));
                if (!response.ok) {
                    throw new Error(body.error || ('Request failed: ' + response.status));
                }
                return body;
            });
        }

        function escapeHtml(text) {
            const div = document.createElement('div');
            div.textContent = text;
            return div.innerHTML;
        }

        function linkify(text) {
            return escapeHtml(text).replace(/\[([^\]]+)\]\((https?:[^)]+)\)/g, '<a href="$2" target="_blank">$1</a>');
        }

        function refreshButton() {
            mergeButton.disabled = merging || imageCount === 0;
        }

        function showError(message) {
            errorDiv.innerHTML = linkify(message);
            errorDiv.style.display = 'block';
        }

        async function startSession() {
            const response = await fetch('/api/sessions', { method: 'POST' });
            const snapshot = await response.json();
            sessionId = snapshot.id;
            imageCount = snapshot.images.length;
            refreshButton();
            await loadPresets(snapshot.preset.index);
        }

        async function loadPresets(selected) {
            const presets = await fetch('/api/presets').then((r) => r.json());
            presetsDiv.innerHTML = '';
            presets.forEach((preset) => {
                const card = document.createElement('div');
                card.className = 'preset' + (preset.index === selected ? ' selected' : '');
                card.innerHTML = '<img alt=""><div class="preset-caption"></div>';
                card.querySelector('img').src = preset.thumbnail_url;
                card.querySelector('.preset-caption').textContent = preset.caption;
                card.addEventListener('click', () => selectPreset(preset.index));
                presetsDiv.appendChild(card);
            });
        }

        async function selectPreset(index) {
            try {
                const snapshot = await api('/preset', {
                    method: 'PUT',
                    headers: { 'Content-Type': 'application/json' },
                    body: JSON.stringify({ index }),
                });
                [...presetsDiv.children].forEach((card, i) => card.classList.toggle('selected', i === snapshot.preset.index));
            } catch (error) {
                showError(error.message);
            }
        }

        async function uploadFiles(files) {
            const accepted = [...files].filter((file) => /\.(png|jpe?g)$/i.test(file.name));
            const formData = new FormData();
            accepted.forEach((file) => formData.append('images', file, file.name));

            thumbs.innerHTML = '';
            accepted.forEach((file) => {
                const img = document.createElement('img');
                const reader = new FileReader();
                reader.onload = (e) => { img.src = e.target.result; };
                reader.readAsDataURL(file);
                thumbs.appendChild(img);
            });

            errorDiv.style.display = 'none';
            try {
                const snapshot = await api('/images', { method: 'PUT', body: formData });
                imageCount = snapshot.images.length;
            } catch (error) {
                imageCount = 0;
                showError(error.message);
            }
            refreshButton();
        }

        function renderStatus(status) {
            if (status.progress) {
                progress.style.display = 'block';
                progressLabel.textContent = status.progress.label;
                progressBar.style.width = status.progress.percent + '%';
            } else {
                progress.style.display = 'none';
            }

            summary.textContent = status.summary ? '🌟 ' + status.summary : '';

            if (status.message) {
                showError(status.message);
            }

            if (status.phase === 'rendered') {
                gallery.style.gridTemplateColumns = 'repeat(' + status.gallery.length + ', 1fr)';
                gallery.innerHTML = '';
                status.gallery.forEach((slot) => {
                    const cell = document.createElement(slot ? 'img' : 'div');
                    if (slot) {
                        cell.src = slot.data_url;
                    } else {
                        cell.className = 'empty';
                    }
                    gallery.appendChild(cell);
                });
            }
        }

        async function merge() {
            merging = true;
            refreshButton();
            errorDiv.style.display = 'none';
            summary.textContent = '';
            gallery.innerHTML = '';

            try {
                let status = await api('/merge', { method: 'POST' });
                renderStatus(status);
                while (['encoding', 'submitted', 'polling', 'ready'].includes(status.phase)) {
                    await new Promise((resolve) => setTimeout(resolve, 250));
                    status = await api('/merge');
                    renderStatus(status);
                }
            } catch (error) {
                progress.style.display = 'none';
                showError(error.message);
            }

            merging = false;
            refreshButton();
        }

        uploadArea.addEventListener('click', () => fileInput.click());

        uploadArea.addEventListener('dragover', (e) => {
            e.preventDefault();
            uploadArea.classList.add('dragover');
        });

        uploadArea.addEventListener('dragleave', () => {
            uploadArea.classList.remove('dragover');
        });

        uploadArea.addEventListener('drop', (e) => {
            e.preventDefault();
            uploadArea.classList.remove('dragover');
            uploadFiles(e.dataTransfer.files);
        });

        fileInput.addEventListener('change', (e) => uploadFiles(e.target.files));
        mergeButton.addEventListener('click', merge);

        // A page kept in the back/forward cache may come back; keep its session.
        window.addEventListener('pagehide', (event) => {
            if (event.persisted || !sessionId) {
                return;
            }
            fetch('/api/sessions/' + sessionId, { method: 'DELETE', keepalive: true });
        });

        // Restored from the cache after the session idled out: start over.
        window.addEventListener('pageshow', async (event) => {
            if (!event.persisted || !sessionId) {
                return;
            }
            const response = await fetch('/api/sessions/' + sessionId);
            if (response.status === 404) {
                await startSession();
            }
        });

        startSession();
    </script>
</body>
</html>
        "#,
    )
}
