use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ArgAction, ColorChoice, Command,
};

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("keygate")
        .about("Single-sign-on authentication service")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("KEYGATE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("data-dir")
                .short('d')
                .long("data-dir")
                .help("Directory holding the user record files")
                .env("KEYGATE_DATA_DIR")
                .required(true),
        )
        .arg(
            Arg::new("log-dir")
                .long("log-dir")
                .help("Directory for audit log files, stderr when unset")
                .env("KEYGATE_LOG_DIR"),
        )
        .arg(
            Arg::new("allow-origin")
                .long("allow-origin")
                .help("Origin host to allow, repeatable; same-origin only when unset")
                .env("KEYGATE_ALLOW_ORIGIN")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("block-origin")
                .long("block-origin")
                .help("Origin host to reject, repeatable")
                .env("KEYGATE_BLOCK_ORIGIN")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("token-timeout")
                .short('t')
                .long("token-timeout")
                .help("Token lifetime in seconds")
                .default_value("600")
                .env("KEYGATE_TOKEN_TIMEOUT")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new("recycling-span")
                .long("recycling-span")
                .help("Seconds between revoked-ticket cleanups")
                .default_value("60")
                .env("KEYGATE_RECYCLING_SPAN")
                .value_parser(clap::value_parser!(i64).range(0..)),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("KEYGATE_LOG_LEVEL")
                .global(true)
                .action(ArgAction::Count)
                .value_parser(validator_log_level()),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "keygate");
        assert_eq!(
            command.get_about().unwrap().to_string(),
            "Single-sign-on authentication service"
        );
        assert_eq!(
            command.get_version().unwrap().to_string(),
            env!("CARGO_PKG_VERSION")
        );
    }

    #[test]
    fn test_check_port_and_dirs() {
        let command = new();
        let matches = command.get_matches_from(vec![
            "keygate",
            "--port",
            "8443",
            "--data-dir",
            "/var/lib/keygate",
            "--log-dir",
            "/var/log/keygate",
            "--allow-origin",
            "app.example.com",
            "--allow-origin",
            "admin.example.com",
        ]);

        assert_eq!(matches.get_one::<u16>("port").copied(), Some(8443));
        assert_eq!(
            matches.get_one::<String>("data-dir").map(|s| s.to_string()),
            Some("/var/lib/keygate".to_string())
        );
        assert_eq!(
            matches.get_one::<String>("log-dir").map(|s| s.to_string()),
            Some("/var/log/keygate".to_string())
        );
        let origins: Vec<String> = matches
            .get_many::<String>("allow-origin")
            .map(|values| values.cloned().collect())
            .unwrap_or_default();
        assert_eq!(origins, ["app.example.com", "admin.example.com"]);
        assert_eq!(matches.get_one::<i64>("token-timeout").copied(), Some(600));
        assert_eq!(matches.get_one::<i64>("recycling-span").copied(), Some(60));
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("KEYGATE_PORT", Some("443")),
                ("KEYGATE_DATA_DIR", Some("/srv/keygate/data")),
                ("KEYGATE_TOKEN_TIMEOUT", Some("1200")),
                ("KEYGATE_LOG_LEVEL", Some("info")),
            ],
            || {
                let command = new();
                let matches = command.get_matches_from(vec!["keygate"]);
                assert_eq!(matches.get_one::<u16>("port").copied(), Some(443));
                assert_eq!(
                    matches.get_one::<String>("data-dir").map(|s| s.to_string()),
                    Some("/srv/keygate/data".to_string())
                );
                assert_eq!(matches.get_one::<i64>("token-timeout").copied(), Some(1200));
                assert_eq!(matches.get_one::<u8>("verbosity").copied(), Some(2));
            },
        );
    }

    #[test]
    fn test_check_log_level_env() {
        // loop cover all possible value_parse
        let levels = vec!["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars(
                [
                    ("KEYGATE_LOG_LEVEL", Some(level)),
                    ("KEYGATE_DATA_DIR", Some("/srv/keygate/data")),
                ],
                || {
                    let command = new();
                    let matches = command.get_matches_from(vec!["keygate"]);
                    assert_eq!(
                        matches.get_one::<u8>("verbosity").copied(),
                        Some(index as u8)
                    );
                },
            );
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        // loop cover all possible value_parse
        let levels = vec!["error", "warn", "info", "debug", "trace"];
        for (index, _) in levels.iter().enumerate() {
            temp_env::with_vars([("KEYGATE_LOG_LEVEL", None::<String>)], || {
                let mut args = vec![
                    "keygate".to_string(),
                    "--data-dir".to_string(),
                    "/srv/keygate/data".to_string(),
                ];

                // Add the appropriate number of "-v" flags based on the index
                if index > 0 {
                    let v = format!("-{}", "v".repeat(index));
                    args.push(v);
                }

                let command = new();

                let matches = command.get_matches_from(args);

                assert_eq!(
                    matches.get_one::<u8>("verbosity").copied(),
                    Some(index as u8)
                );
            });
        }
    }

    #[test]
    fn test_token_timeout_must_be_positive() {
        let command = new();
        let result = command.try_get_matches_from(vec![
            "keygate",
            "--data-dir",
            "/srv/keygate/data",
            "--token-timeout",
            "0",
        ]);
        assert!(result.is_err());
    }
}
