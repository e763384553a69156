use std::path::Path;
use std::process::Command;

use crate::error::{MailbotError, Result};

/// Editor command line: the configured one, else $VISUAL, $EDITOR, `vi`.
pub fn editor_command(configured: Option<&str>) -> String {
    configured
        .map(str::to_string)
        .or_else(|| std::env::var("VISUAL").ok())
        .or_else(|| std::env::var("EDITOR").ok())
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| "vi".to_string())
}

/// Open `path` in the editor and block until it exits. Nothing is read
/// back here; the next report run picks up the edits.
pub fn launch_editor(editor: &str, path: &Path) -> Result<()> {
    let mut parts = editor.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| MailbotError::Editor("empty editor command".to_string()))?;
    tracing::info!(editor, path = %path.display(), "opening editor");

    let status = Command::new(program)
        .args(parts)
        .arg(path)
        .status()
        .map_err(|e| MailbotError::Editor(format!("cannot start {program}: {e}")))?;
    if !status.success() {
        return Err(MailbotError::Editor(format!("{program} exited with {status}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_editor_wins() {
        assert_eq!(editor_command(Some("nano -w")), "nano -w");
    }

    #[test]
    fn test_launch_editor_waits_for_exit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unclassified.txt");
        std::fs::write(&path, "- 1.00 1 X\n").unwrap();
        launch_editor("true", &path).unwrap();
        assert!(matches!(
            launch_editor("false", &path),
            Err(MailbotError::Editor(_))
        ));
        assert!(matches!(
            launch_editor("   ", &path),
            Err(MailbotError::Editor(_))
        ));
    }
}
