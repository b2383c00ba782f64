use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Optional JSONL event log for a filler instance. One line per stamped
/// field plus a summary, for diagnosing coordinate regressions in a
/// deployment without shipping the rendered PDFs around.
#[derive(Debug, Clone)]
pub(crate) struct RenderLog {
    inner: Arc<Mutex<BufWriter<File>>>,
}

impl RenderLog {
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(BufWriter::new(file))),
        })
    }

    pub fn field(&self, id: &str, lines: usize, truncated: bool) {
        self.write_line(&format!(
            "{{\"type\":\"field\",\"id\":\"{}\",\"lines\":{},\"truncated\":{}}}",
            json_escape(id),
            lines,
            truncated
        ));
    }

    pub fn signature(&self, page_index: usize, width: f32, height: f32) {
        self.write_line(&format!(
            "{{\"type\":\"signature\",\"page\":{},\"width\":{},\"height\":{}}}",
            page_index, width, height
        ));
    }

    pub fn summary(&self, fields: usize, output_bytes: usize, render_ms: f64) {
        self.write_line(&format!(
            "{{\"type\":\"summary\",\"fields\":{},\"output_bytes\":{},\"render_ms\":{}}}",
            fields, output_bytes, render_ms
        ));
        if let Ok(mut writer) = self.inner.lock() {
            let _ = writer.flush();
        }
    }

    fn write_line(&self, json: &str) {
        if let Ok(mut writer) = self.inner.lock() {
            let _ = writeln!(writer, "{json}");
        }
    }
}

pub(crate) fn json_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 8);
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out
}
