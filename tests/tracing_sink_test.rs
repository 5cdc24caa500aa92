//! The default sink writes failures as tracing error events.

use std::io;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use task_logger::{CompletionContext, TracingSink, spawn};

/// Collects everything the fmt layer writes.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn subscriber(out: Captured) -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::fmt()
        .with_writer(move || out.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish()
}

#[tokio::test]
async fn failure_is_written_as_error_event() {
    let out = Captured::default();
    let _guard = tracing::subscriber::set_default(subscriber(out.clone()));

    let handle = spawn(
        async { Err::<(), _>(anyhow!("bad input")) },
        CompletionContext::new(TracingSink, "processing failed: %s").arg("user123"),
        "process",
        None,
    )
    .unwrap();
    assert!(handle.await.is_failed());

    let logged = out.contents();
    let line = logged
        .lines()
        .find(|l| l.contains("ERROR"))
        .expect("an error event");
    assert!(line.contains("processing failed: user123"), "{line}");
    assert!(line.contains("error=bad input"), "{line}");
    assert!(line.contains("task.name=\"process\""), "{line}");
    assert!(line.contains("failure.kind=\"error\""), "{line}");
}

#[tokio::test]
async fn success_writes_no_error_event() {
    let out = Captured::default();
    let _guard = tracing::subscriber::set_default(subscriber(out.clone()));

    let handle = spawn(
        async { Ok::<_, anyhow::Error>(1) },
        CompletionContext::new(TracingSink, "never logged"),
        "quiet",
        None,
    )
    .unwrap();
    assert!(handle.await.is_succeeded());

    let logged = out.contents();
    assert!(!logged.contains("ERROR"), "{logged}");
    assert!(logged.contains("task finished"), "{logged}");
}
