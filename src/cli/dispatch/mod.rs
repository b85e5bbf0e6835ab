use crate::cli::actions::Action;
use anyhow::Result;
use std::path::PathBuf;

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let origins = |name: &str| -> Vec<String> {
        matches
            .get_many::<String>(name)
            .map(|values| values.cloned().collect())
            .unwrap_or_default()
    };

    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        data_dir: matches
            .get_one::<String>("data-dir")
            .map(PathBuf::from)
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --data-dir"))?,
        log_dir: matches.get_one::<String>("log-dir").map(PathBuf::from),
        allow_origin: origins("allow-origin"),
        block_origin: origins("block-origin"),
        token_timeout: matches
            .get_one::<i64>("token-timeout")
            .copied()
            .unwrap_or(600),
        recycling_span: matches
            .get_one::<i64>("recycling-span")
            .copied()
            .unwrap_or(60),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;

    #[test]
    fn handler_builds_the_server_action() -> Result<()> {
        let matches = commands::new().get_matches_from(vec![
            "keygate",
            "--data-dir",
            "/srv/keygate/data",
            "--block-origin",
            "evil.example.com",
        ]);
        let Action::Server {
            port,
            data_dir,
            log_dir,
            allow_origin,
            block_origin,
            token_timeout,
            recycling_span,
        } = handler(&matches)?;

        assert_eq!(port, 8080);
        assert_eq!(data_dir, PathBuf::from("/srv/keygate/data"));
        assert_eq!(log_dir, None);
        assert!(allow_origin.is_empty());
        assert_eq!(block_origin, ["evil.example.com"]);
        assert_eq!(token_timeout, 600);
        assert_eq!(recycling_span, 60);
        Ok(())
    }
}
