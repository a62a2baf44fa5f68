//! Command line options.

use std::path::PathBuf;

use surge_core::engine_version_string;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoQuality {
    Low,
    Medium,
    High,
}

impl VideoQuality {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Parsed command line. Options left unset defer to the preferences.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandLine {
    pub gamedir: Option<PathBuf>,
    pub verbose: bool,
    pub fullscreen: Option<bool>,
    /// Window scale, 1 to 4.
    pub video_resolution: Option<u32>,
    pub video_quality: Option<VideoQuality>,
    pub show_fps: Option<bool>,
    pub compatibility_version: Option<String>,
    pub language_filepath: Option<PathBuf>,
    pub custom_level_path: Option<PathBuf>,
    pub custom_quest_path: Option<PathBuf>,
    pub mobile: bool,
    /// Arguments after `--`, handed to the scripts untouched.
    pub user_argv: Vec<String>,
}

impl CommandLine {
    pub fn compatibility_mode(&self) -> bool {
        self.compatibility_version.is_some()
    }

    pub fn user_argc(&self) -> usize {
        self.user_argv.len()
    }
}

/// What the program should do with its command line.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    Run(CommandLine),
    Help,
    Version,
}

pub fn usage() -> String {
    [
        "Usage: opensurge [options...]",
        "",
        "  --help, -h                   show this message",
        "  --version, -v                show the version of the engine",
        "  --resolution 1|2|3|4         window scale",
        "  --quality low|medium|high    video quality",
        "  --fullscreen                 fullscreen mode",
        "  --windowed                   windowed mode",
        "  --show-fps                   show the FPS counter",
        "  --hide-fps                   hide the FPS counter",
        "  --mobile                     mobile mode",
        "  --verbose                    debug logging",
        "  --level <path>               run a level",
        "  --quest <path>               run a quest",
        "  --language <path>            use a language file",
        "  --game-folder <path>         use a game folder",
        "  --compatibility-mode <ver>   run as an older engine version",
        "  -- <args...>                 arguments for the scripts",
    ]
    .join("\n")
}

pub fn version() -> String {
    format!("opensurge {}", engine_version_string())
}

/// Parses the arguments, program name excluded.
pub fn parse_args<I, S>(args: I) -> Result<Invocation, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_string()).collect();
    let mut cmd = CommandLine::default();
    let mut i = 0;

    while i < args.len() {
        let arg = args[i].as_str();
        let mut value = |name: &str| -> Result<String, String> {
            i += 1;
            args.get(i)
                .filter(|v| !v.starts_with("--"))
                .cloned()
                .ok_or_else(|| format!("Missing parameter for {name}\n{}", usage()))
        };

        match arg {
            "--help" | "-h" => return Ok(Invocation::Help),
            "--version" | "-v" => return Ok(Invocation::Version),
            "--resolution" => {
                let v = value(arg)?;
                let scale = v
                    .parse::<u32>()
                    .ok()
                    .filter(|s| (1..=4).contains(s))
                    .ok_or_else(|| format!("Invalid resolution '{v}': expected 1, 2, 3 or 4"))?;
                cmd.video_resolution = Some(scale);
            }
            "--quality" => {
                let v = value(arg)?;
                cmd.video_quality = Some(
                    VideoQuality::parse(&v)
                        .ok_or_else(|| format!("Invalid quality '{v}': expected low, medium or high"))?,
                );
            }
            "--fullscreen" => cmd.fullscreen = Some(true),
            "--windowed" => cmd.fullscreen = Some(false),
            "--show-fps" => cmd.show_fps = Some(true),
            "--hide-fps" => cmd.show_fps = Some(false),
            "--mobile" => cmd.mobile = true,
            "--verbose" => cmd.verbose = true,
            "--level" => cmd.custom_level_path = Some(PathBuf::from(value(arg)?)),
            "--quest" => cmd.custom_quest_path = Some(PathBuf::from(value(arg)?)),
            "--language" => cmd.language_filepath = Some(PathBuf::from(value(arg)?)),
            "--game-folder" => cmd.gamedir = Some(PathBuf::from(value(arg)?)),
            "--compatibility-mode" => {
                let v = value(arg)?;
                if !is_version(&v) {
                    return Err(format!("Invalid version '{v}' for --compatibility-mode"));
                }
                cmd.compatibility_version = Some(v);
            }
            "--" => {
                cmd.user_argv = args[i + 1..].to_vec();
                break;
            }
            other => return Err(format!("Unknown option '{other}'\n{}", usage())),
        }
        i += 1;
    }

    Ok(Invocation::Run(cmd))
}

/// `x.y.z` (or `x.y`), digits only. Parsed by hand so that the locale of the
/// host never gets a say in what a separator is.
fn is_version(value: &str) -> bool {
    let parts: Vec<&str> = value.split('.').collect();
    (2..=4).contains(&parts.len())
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(args: &[&str]) -> CommandLine {
        match parse_args(args).expect("parses") {
            Invocation::Run(cmd) => cmd,
            other => panic!("expected a run, got {other:?}"),
        }
    }

    #[test]
    fn no_arguments_is_a_plain_run() {
        assert_eq!(run(&[]), CommandLine::default());
    }

    #[test]
    fn options_fill_the_command_line() {
        let cmd = run(&[
            "--level",
            "levels/a.lev",
            "--resolution",
            "3",
            "--windowed",
            "--hide-fps",
            "--verbose",
            "--compatibility-mode",
            "0.5.2",
        ]);
        assert_eq!(cmd.custom_level_path, Some(PathBuf::from("levels/a.lev")));
        assert_eq!(cmd.video_resolution, Some(3));
        assert_eq!(cmd.fullscreen, Some(false));
        assert_eq!(cmd.show_fps, Some(false));
        assert!(cmd.verbose);
        assert!(cmd.compatibility_mode());
    }

    #[test]
    fn everything_after_the_separator_goes_to_the_scripts() {
        let cmd = run(&["--mobile", "--", "--level", "x"]);
        assert!(cmd.mobile);
        assert_eq!(cmd.user_argv, vec!["--level", "x"]);
        assert_eq!(cmd.user_argc(), 2);
        assert!(cmd.custom_level_path.is_none());
    }

    #[test]
    fn help_and_version_short_circuit() {
        assert_eq!(parse_args(["-h", "--bogus"]), Ok(Invocation::Help));
        assert_eq!(parse_args(["--version"]), Ok(Invocation::Version));
    }

    #[test]
    fn bad_input_is_an_error() {
        assert!(parse_args(["level.lev"]).is_err());
        assert!(parse_args(["--level"]).is_err());
        assert!(parse_args(["--quest", "--mobile"]).is_err());
        assert!(parse_args(["--resolution", "5"]).is_err());
        assert!(parse_args(["--quality", "ultra"]).is_err());
        assert!(parse_args(["--compatibility-mode", "0,5"]).is_err());
    }
}
