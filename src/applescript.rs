use std::process::Command;
use anyhow::{Context, Result};

pub fn run(script: &str) -> Result<String> {
    #[cfg(target_os = "macos")]
    {
        let output = Command::new("osascript")
            .arg("-e")
            .arg(script)
            .output()
            .context("Failed to run AppleScript")?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            return Err(anyhow::anyhow!("AppleScript Error: {}", stderr));
        }

        Ok(stdout)
    }
    #[cfg(not(target_os = "macos"))]
    {
        Ok("AppleScript functionality is only available on macOS.".to_string())
    }
}

pub fn get_active_window_context() -> Result<(String, String)> {
    // Returns (Window Title, Browser URL)
    let script = r#"
        global frontApp, windowTitle, browserUrl
        set windowTitle to ""
        set browserUrl to ""

        tell application "System Events"
            set frontApp to name of first application process whose frontmost is true
        end tell

        if frontApp is "Google Chrome" then
            tell application "Google Chrome"
                if (count of windows) > 0 then
                    set windowTitle to title of active tab of front window
                    set browserUrl to URL of active tab of front window
                end if
            end tell
        else if frontApp is "Safari" then
            tell application "Safari"
                if (count of documents) > 0 then
                    set windowTitle to name of front document
                    set browserUrl to URL of front document
                end if
            end tell
        else
            tell application "System Events"
                tell process frontApp
                    if (count of windows) > 0 then
                        set windowTitle to name of front window
                    end if
                end tell
            end tell
        end if

        return windowTitle & "|||" & browserUrl
    "#;

    let output = run(script)?;
    let parts: Vec<&str> = output.split("|||").collect();
    let title = parts.get(0).unwrap_or(&"").trim().to_string();
    let url = parts.get(1).unwrap_or(&"").trim().to_string();

    Ok((title, url))
}
