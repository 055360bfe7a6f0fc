use crate::errors::{ErrorKind, MigrateError, MigrateResult};
use crate::reconcile::Target;
use crate::NO_VERSION;
use std::fmt::{Display, Formatter};

/// A parsed migrator command.
///
/// The textual surface is a command name followed by at most one base-10
/// version argument:
///
/// | name          | argument             |
/// |---------------|----------------------|
/// | `init`        | none                 |
/// | `up`          | optional target      |
/// | `down`        | none                 |
/// | `reset`       | none                 |
/// | `version`     | none                 |
/// | `set_version` | required target      |
///
/// Arguments past the ones a command uses are ignored.
///
/// # Examples
///
/// ```rust
/// use docmigrate::migrator::Command;
/// use docmigrate::reconcile::Target;
///
/// assert_eq!(Command::parse(&["up"]).unwrap(), Command::Up(Target::Latest));
/// assert_eq!(Command::parse(&["up", "4"]).unwrap(), Command::Up(Target::Version(4)));
/// assert_eq!(Command::parse(&["set_version", "2"]).unwrap(), Command::SetVersion(2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Init,
    Up(Target),
    Down,
    Reset,
    Version,
    SetVersion(i64),
}

impl Command {
    /// Parses a command from its name and arguments.
    ///
    /// For `up`, [`NO_VERSION`] is accepted as an explicit spelling of
    /// "latest".
    ///
    /// # Errors
    ///
    /// * `CommandRequired` - `args` is empty
    /// * `UnexpectedCommand` - the name is not a known command
    /// * `VersionNumberRequired` - `set_version` without a version
    /// * `InvalidVersionFormat` - the version is not a signed 64-bit integer
    pub fn parse<S: AsRef<str>>(args: &[S]) -> MigrateResult<Command> {
        let Some((name, rest)) = args.split_first() else {
            log::error!("No command given");
            return Err(MigrateError::new(
                "A command is required",
                ErrorKind::CommandRequired,
            ));
        };

        match name.as_ref() {
            "init" => Ok(Command::Init),
            "up" => match parse_version(rest, false)? {
                None => Ok(Command::Up(Target::Latest)),
                Some(NO_VERSION) => Ok(Command::Up(Target::Latest)),
                Some(version) => Ok(Command::Up(Target::Version(version))),
            },
            "down" => Ok(Command::Down),
            "reset" => Ok(Command::Reset),
            "version" => Ok(Command::Version),
            "set_version" => match parse_version(rest, true)? {
                Some(version) => Ok(Command::SetVersion(version)),
                None => Err(version_required()),
            },
            other => {
                log::error!("Unexpected command '{}'", other);
                Err(MigrateError::new(
                    &format!(
                        "Unexpected command '{}', expected one of init, up, down, reset, version, set_version",
                        other
                    ),
                    ErrorKind::UnexpectedCommand,
                ))
            }
        }
    }

    /// The command name as accepted by [`Command::parse`].
    pub fn name(&self) -> &'static str {
        match self {
            Command::Init => "init",
            Command::Up(_) => "up",
            Command::Down => "down",
            Command::Reset => "reset",
            Command::Version => "version",
            Command::SetVersion(_) => "set_version",
        }
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Up(Target::Version(version)) | Command::SetVersion(version) => {
                write!(f, "{} {}", self.name(), version)
            }
            _ => write!(f, "{}", self.name()),
        }
    }
}

fn parse_version<S: AsRef<str>>(args: &[S], required: bool) -> MigrateResult<Option<i64>> {
    match args.first() {
        None if required => Err(version_required()),
        None => Ok(None),
        Some(arg) => {
            let arg = arg.as_ref();
            match arg.parse::<i64>() {
                Ok(version) => Ok(Some(version)),
                Err(err) => {
                    log::error!("Invalid version argument '{}': {}", arg, err);
                    Err(MigrateError::new(
                        &format!("Invalid version argument '{}': {}", arg, err),
                        ErrorKind::InvalidVersionFormat,
                    ))
                }
            }
        }
    }
}

fn version_required() -> MigrateError {
    log::error!("Version number required");
    MigrateError::new(
        "A version number is required",
        ErrorKind::VersionNumberRequired,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(args: &[&str]) -> ErrorKind {
        Command::parse(args).unwrap_err().kind().clone()
    }

    #[test]
    fn test_parse_every_command() {
        assert_eq!(Command::parse(&["init"]).unwrap(), Command::Init);
        assert_eq!(Command::parse(&["up"]).unwrap(), Command::Up(Target::Latest));
        assert_eq!(
            Command::parse(&["up", "7"]).unwrap(),
            Command::Up(Target::Version(7))
        );
        assert_eq!(Command::parse(&["down"]).unwrap(), Command::Down);
        assert_eq!(Command::parse(&["reset"]).unwrap(), Command::Reset);
        assert_eq!(Command::parse(&["version"]).unwrap(), Command::Version);
        assert_eq!(
            Command::parse(&["set_version", "3"]).unwrap(),
            Command::SetVersion(3)
        );
    }

    #[test]
    fn test_up_with_no_version_means_latest() {
        assert_eq!(
            Command::parse(&["up", "-1"]).unwrap(),
            Command::Up(Target::Latest)
        );
    }

    #[test]
    fn test_parse_accepts_owned_strings() {
        let args = vec!["up".to_string(), "2".to_string()];
        assert_eq!(
            Command::parse(args.as_slice()).unwrap(),
            Command::Up(Target::Version(2))
        );
    }

    #[test]
    fn test_usage_errors_are_distinct() {
        let empty: [&str; 0] = [];
        assert_eq!(kind_of(&empty), ErrorKind::CommandRequired);
        assert_eq!(kind_of(&["migrate"]), ErrorKind::UnexpectedCommand);
        assert_eq!(kind_of(&["set_version"]), ErrorKind::VersionNumberRequired);
        assert_eq!(kind_of(&["set_version", "two"]), ErrorKind::InvalidVersionFormat);
        assert_eq!(kind_of(&["up", "1.5"]), ErrorKind::InvalidVersionFormat);
        assert_eq!(
            kind_of(&["up", "99999999999999999999"]),
            ErrorKind::InvalidVersionFormat
        );
    }

    #[test]
    fn test_command_names_are_case_sensitive() {
        assert_eq!(kind_of(&["UP"]), ErrorKind::UnexpectedCommand);
        assert_eq!(kind_of(&["set-version", "1"]), ErrorKind::UnexpectedCommand);
    }

    #[test]
    fn test_extra_arguments_are_ignored() {
        assert_eq!(Command::parse(&["down", "5"]).unwrap(), Command::Down);
        assert_eq!(
            Command::parse(&["up", "2", "3"]).unwrap(),
            Command::Up(Target::Version(2))
        );
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for command in [
            Command::Init,
            Command::Up(Target::Latest),
            Command::Up(Target::Version(4)),
            Command::Down,
            Command::Reset,
            Command::Version,
            Command::SetVersion(2),
        ] {
            let text = command.to_string();
            let args: Vec<&str> = text.split(' ').collect();
            assert_eq!(Command::parse(args.as_slice()).unwrap(), command);
        }
    }
}
