use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_match_the_documented_values() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
    assert_eq!(settings.uploads.max_request_bytes.get(), 200 * 1024 * 1024);
    assert_eq!(settings.cache.recent_window, Duration::from_secs(7200));
    assert_eq!(settings.auth.token_ttl, Duration::from_secs(86_400));
    assert_eq!(settings.auth.salt_rounds, 10);
    assert_eq!(settings.media.folder, "my-blog-uploads");
    assert_eq!(
        settings.media.api_base.as_str(),
        "https://api.cloudinary.com/v1_1"
    );
    assert!(settings.auth.token_secret.is_none());
    assert!(settings.admin.credentials().is_none());
}

#[test]
fn recent_window_can_be_overridden_via_cli() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        cache_recent_window_seconds: Some(90),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.cache.recent_window, Duration::from_secs(90));
}

#[test]
fn zero_recent_window_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.recent_window_seconds = Some(0);

    match Settings::from_raw(raw) {
        Err(LoadError::Invalid { key, .. }) => assert_eq!(key, "cache.recent_window_seconds"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn salt_rounds_outside_bcrypt_range_are_rejected() {
    let mut raw = RawSettings::default();
    raw.auth.salt_rounds = Some(3);

    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "auth.salt_rounds",
            ..
        })
    ));
}

#[test]
fn admin_credentials_require_both_fields() {
    let mut raw = RawSettings::default();
    raw.admin.name = Some("admin".to_string());
    let settings = Settings::from_raw(raw.clone()).expect("valid settings");
    assert!(settings.admin.credentials().is_none());

    raw.admin.password = Some("s3cret".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.admin.credentials(), Some(("admin", "s3cret")));
}

#[test]
fn media_folder_is_trimmed_of_slashes() {
    let mut raw = RawSettings::default();
    raw.media.folder = Some("my-blog-uploads/".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.media.folder, "my-blog-uploads");
}

#[test]
fn non_http_media_base_is_rejected() {
    let mut raw = RawSettings::default();
    raw.media.api_base = Some("ftp://example.com".to_string());

    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "media.api_base",
            ..
        })
    ));
}

#[test]
fn secrets_are_redacted_in_debug_output() {
    let mut raw = RawSettings::default();
    raw.auth.token_secret = Some("super-secret".to_string());
    raw.admin.password = Some("hunter2".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    let rendered = format!("{settings:?}");
    assert!(!rendered.contains("super-secret"));
    assert!(!rendered.contains("hunter2"));
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["chronicle"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_migrate_arguments() {
    let args = CliArgs::parse_from([
        "chronicle",
        "migrate",
        "--database-url",
        "postgres://example",
    ]);

    match args.command.expect("migrate command") {
        Command::Migrate(migrate) => {
            assert_eq!(
                migrate.database.database_url.as_deref(),
                Some("postgres://example")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "chronicle",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--database-url",
        "postgres://override",
        "--cache-recent-window-seconds",
        "600",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(
                serve.overrides.database_url.as_deref(),
                Some("postgres://override")
            );
            assert_eq!(serve.overrides.cache_recent_window_seconds, Some(600));
        }
        _ => panic!("wrong command parsed"),
    }
}
