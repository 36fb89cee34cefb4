//! Command Normalization - Turns raw command strings into comparable identities
//!
//! The same executable can appear as `"C:\Program Files\App\app.exe" /tray`,
//! `C:\PROGRA~1\App\app.exe` or a bare `app.exe`. All of them normalize to `app`.

use std::sync::OnceLock;
use regex::Regex;

/// 8.3 tokens commonly found in autostart commands
const SHORT_TOKENS: &[(&str, &str)] = &[
    ("progra~1", "program files"),
    ("progra~2", "program files (x86)"),
    ("common~1", "common files"),
    ("micros~1", "microsoft"),
    ("docume~1", "documents and settings"),
    ("locals~1", "local settings"),
    ("applic~1", "application data"),
];

/// Extensions that end an unquoted program path
const PROGRAM_EXTENSIONS: &[&str] = &[".exe", ".com", ".bat", ".cmd", ".vbs", ".vbe", ".js", ".ps1", ".lnk"];

/// Launchers whose first argument names the real program
const HOST_LAUNCHERS: &[&str] = &["rundll32", "wscript", "cscript", "mshta", "regsvr32"];

fn env_var_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"%([A-Za-z0-9_()]+)%").expect("static regex"))
}

/// Executable part of a command line, quotes stripped, casing preserved.
pub fn extract_executable(command: &str) -> String {
    let cmd = command.trim();
    if cmd.is_empty() {
        return String::new();
    }

    if let Some(rest) = cmd.strip_prefix('"') {
        return match rest.find('"') {
            Some(end) => rest[..end].to_string(),
            None => rest.to_string(),
        };
    }

    // Unquoted paths with spaces: take everything up to the first known extension that ends a token
    if let Some(end) = program_end(cmd) {
        return cmd[..end].to_string();
    }

    cmd.split_whitespace().next().unwrap_or("").to_string()
}

/// Byte offset just past the first `.ext` (ASCII, any case) that closes a token
fn program_end(cmd: &str) -> Option<usize> {
    let bytes = cmd.as_bytes();
    bytes
        .iter()
        .enumerate()
        .filter(|(_, &b)| b == b'.')
        .find_map(|(dot, _)| {
            PROGRAM_EXTENSIONS.iter().find_map(|ext| {
                let end = dot + ext.len();
                let candidate = bytes.get(dot..end)?;
                if !candidate.eq_ignore_ascii_case(ext.as_bytes()) {
                    return None;
                }
                // The extension is ASCII, so `end` is a char boundary
                let closes = end == bytes.len() || cmd[end..].starts_with(char::is_whitespace);
                closes.then_some(end)
            })
        })
}

/// Arguments after the executable
fn arguments(command: &str) -> &str {
    let cmd = command.trim();
    if let Some(rest) = cmd.strip_prefix('"') {
        return match rest.find('"') {
            Some(end) => rest[end + 1..].trim(),
            None => "",
        };
    }
    let exe_len = extract_executable(cmd).len();
    cmd.get(exe_len..).unwrap_or("").trim()
}

/// Expand `%VAR%` references that are set in the current environment
pub fn expand_env_vars(path: &str) -> String {
    env_var_regex()
        .replace_all(path, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

/// Replace known 8.3 tokens in a lower-cased path
pub fn expand_short_tokens(path: &str) -> String {
    path.split(['\\', '/'])
        .map(|segment| {
            SHORT_TOKENS
                .iter()
                .find(|(short, _)| *short == segment)
                .map(|(_, long)| *long)
                .unwrap_or(segment)
        })
        .collect::<Vec<_>>()
        .join("\\")
}

/// Ask the filesystem for the long form of paths that still carry `~` tokens
#[cfg(windows)]
fn resolve_long_path(path: &str) -> Option<String> {
    if !path.contains('~') {
        return None;
    }
    let full = std::fs::canonicalize(path).ok()?;
    let text = full.to_string_lossy();
    Some(text.trim_start_matches(r"\\?\").to_lowercase())
}

#[cfg(not(windows))]
fn resolve_long_path(_path: &str) -> Option<String> {
    None
}

/// Lower-cased, quote-stripped, short-path-expanded executable path
pub fn normalize_path(command: &str) -> String {
    let exe = expand_env_vars(&extract_executable(command));
    if let Some(long) = resolve_long_path(&exe) {
        return long;
    }
    expand_short_tokens(&exe.to_lowercase())
}

fn basename(path: &str) -> &str {
    path.rsplit(['\\', '/']).next().unwrap_or(path)
}

fn stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(i) if i > 0 => &name[..i],
        _ => name,
    }
}

/// Lower-case basename of the executable (`app.exe`)
pub fn executable_basename(command: &str) -> String {
    basename(&normalize_path(command)).to_string()
}

/// Dedup key of an autostart entry
pub fn identity_key(command: &str, display_name: &str) -> String {
    let path = normalize_path(command);
    let exe_stem = stem(basename(&path)).trim().to_string();

    if HOST_LAUNCHERS.contains(&exe_stem.as_str()) {
        let target = arguments(command)
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(|s| s.trim_matches('"'))
            .find(|s| !s.is_empty() && !s.starts_with('/') && !s.starts_with('-'));
        if let Some(target) = target {
            let target = target.to_lowercase();
            let target_stem = stem(basename(&target)).trim();
            if !target_stem.is_empty() {
                return target_stem.to_string();
            }
        }
    }

    if exe_stem.is_empty() {
        display_name.trim().to_lowercase()
    } else {
        exe_stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_quoted_and_unquoted() {
        assert_eq!(
            extract_executable(r#""C:\Program Files\App\app.exe" --tray"#),
            r"C:\Program Files\App\app.exe"
        );
        assert_eq!(
            extract_executable(r"C:\Program Files\App\app.exe --tray"),
            r"C:\Program Files\App\app.exe"
        );
        assert_eq!(extract_executable(r"C:\Tools\sync.bat /q"), r"C:\Tools\sync.bat");
        assert_eq!(extract_executable("   "), "");
    }

    #[test]
    fn test_textual_forms_share_identity() {
        let forms = [
            r#""C:\Program Files\Spotify\Spotify.exe" --autostart"#,
            r"C:\PROGRA~1\Spotify\Spotify.exe",
            "spotify.exe",
        ];
        for form in forms {
            assert_eq!(identity_key(form, "Spotify"), "spotify", "{}", form);
        }
    }

    #[test]
    fn test_short_tokens_expand() {
        assert_eq!(
            normalize_path(r"C:\PROGRA~2\COMMON~1\thing.exe"),
            r"c:\program files (x86)\common files\thing.exe"
        );
    }

    #[test]
    fn test_launcher_uses_target() {
        assert_eq!(
            identity_key(r"rundll32.exe C:\Windows\helper.dll,Start", "Helper"),
            "helper"
        );
        assert_eq!(identity_key(r#"wscript.exe "C:\Scripts\login.vbs""#, "Login"), "login");
    }

    #[test]
    fn test_unquoted_scripts_with_spaces() {
        assert_eq!(
            extract_executable(r"C:\Program Files\Acme\tool.bat /silent"),
            r"C:\Program Files\Acme\tool.bat"
        );
        assert_eq!(
            extract_executable(r"C:\Users\John Doe\Startup\Notes.LNK"),
            r"C:\Users\John Doe\Startup\Notes.LNK"
        );
        assert_eq!(identity_key(r"C:\Program Files\Acme\tool.bat /silent", "Acme"), "tool");
        // ".json" is not ".js"
        assert_eq!(extract_executable(r"C:\cfg\a.json b"), r"C:\cfg\a.json");
    }

    #[test]
    fn test_non_ascii_commands() {
        // Lower-casing U+0130 changes its byte length
        assert_eq!(extract_executable("\u{130}.exe"), "\u{130}.exe");
        assert_eq!(extract_executable("\u{130}\u{130} dir\\app.EXE --x"), "\u{130}\u{130} dir\\app.EXE");
        assert_eq!(identity_key(r"C:\Programme\Über Tool\Über.exe /min", "Über"), "über");
        assert!(!identity_key("\u{130}.exe", "Dotted").is_empty());
        assert_eq!(identity_key("ÄÖÜ", "Umlaut"), "äöü");
    }

    #[test]
    fn test_empty_command_falls_back_to_name() {
        assert_eq!(identity_key("", "  My Tool "), "my tool");
    }
}
