//! Best-effort copy to the system clipboard

use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Clipboard program and its arguments for this platform
fn clipboard_command() -> (&'static str, &'static [&'static str]) {
    if cfg!(target_os = "macos") {
        ("pbcopy", &[])
    } else {
        ("xsel", &["--clipboard", "--input"])
    }
}

/// Copy `text` to the clipboard; returns whether it worked
///
/// A missing or failing clipboard utility is never an error for the caller.
pub async fn copy(text: &str) -> bool {
    let (program, args) = clipboard_command();
    match pipe_into(program, args, text).await {
        Ok(true) => true,
        Ok(false) => {
            debug!("{} exited unsuccessfully", program);
            false
        }
        Err(e) => {
            debug!("Clipboard unavailable ({}): {}", program, e);
            false
        }
    }
}

async fn pipe_into(program: &str, args: &[&str], text: &str) -> std::io::Result<bool> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(text.as_bytes()).await?;
        // Closing stdin lets the utility finish.
        drop(stdin);
    }

    Ok(child.wait().await?.success())
}
