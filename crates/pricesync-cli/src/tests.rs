use super::*;

use rust_decimal::Decimal;

#[test]
fn parses_db_ping_command() {
    let cli =
        Cli::try_parse_from(["pricesync-cli", "db", "ping"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Ping
        })
    ));
}

#[test]
fn parses_db_migrate_command() {
    let cli =
        Cli::try_parse_from(["pricesync-cli", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["pricesync-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn sync_run_defaults() {
    let cli = Cli::try_parse_from(["pricesync-cli", "sync", "run"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Sync {
            command: SyncCommands::Run {
                limit: None,
                timeout_secs: None,
                skip_verify: false,
                json: false,
            }
        })
    ));
}

#[test]
fn sync_run_with_limit_timeout_and_skip_verify() {
    let cli = Cli::try_parse_from([
        "pricesync-cli",
        "sync",
        "run",
        "--limit",
        "50",
        "--timeout-secs",
        "600",
        "--skip-verify",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Sync {
            command: SyncCommands::Run {
                limit: Some(50),
                timeout_secs: Some(600),
                skip_verify: true,
                ..
            }
        })
    ));
}

#[test]
fn parses_sync_schedule() {
    let cli = Cli::try_parse_from(["pricesync-cli", "sync", "schedule"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Sync {
            command: SyncCommands::Schedule
        })
    ));
}

#[test]
fn mapping_verify_without_apply() {
    let cli = Cli::try_parse_from([
        "pricesync-cli",
        "mapping",
        "verify",
        "--barcode",
        "012345678905",
        "--identifier",
        "X0000000",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Mapping {
            command: MappingCommands::Verify {
                ref barcode,
                apply: false,
                product_id: None,
                ..
            }
        }) if barcode == "012345678905"
    ));
}

#[test]
fn mapping_apply_requires_product_id() {
    let result = Cli::try_parse_from([
        "pricesync-cli",
        "mapping",
        "verify",
        "--barcode",
        "012345678905",
        "--identifier",
        "X0000000",
        "--apply",
    ]);
    assert!(result.is_err(), "--apply without --product-id must be rejected");
}

#[test]
fn mapping_apply_with_product_id() {
    let cli = Cli::try_parse_from([
        "pricesync-cli",
        "mapping",
        "verify",
        "--barcode",
        "012345678905",
        "--identifier",
        "X0000000",
        "--apply",
        "--product-id",
        "7",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Mapping {
            command: MappingCommands::Verify {
                apply: true,
                product_id: Some(7),
                ..
            }
        })
    ));
}

#[test]
fn price_quote_parses_decimal_cost() {
    let cli = Cli::try_parse_from(["pricesync-cli", "price", "quote", "--cost", "159.66"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Price {
            command: PriceCommands::Quote { cost, .. }
        }) if cost == Decimal::new(15_966, 2)
    ));
}

#[test]
fn price_quote_rejects_non_numeric_cost() {
    let result = Cli::try_parse_from(["pricesync-cli", "price", "quote", "--cost", "cheap"]);
    assert!(result.is_err());
}

#[test]
fn quote_uses_builtin_model_without_override() {
    let calculator = price::load_calculator(None).expect("default model loads");
    let calc = calculator
        .calculate(Decimal::new(15_966, 2))
        .unwrap()
        .rounded_to_cents();
    assert_eq!(calc.competitive_price, Decimal::new(23_502, 2));
}

#[test]
fn missing_model_file_is_an_error() {
    let err = price::load_calculator(Some(std::path::Path::new("/nonexistent/pricing.yaml")))
        .expect_err("missing file must fail");
    assert!(err.to_string().contains("failed to load pricing model"));
}

#[test]
fn running_guard_skips_overlap_and_clears_on_drop() {
    let flag = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));

    let guard = sync::RunningGuard::try_acquire(&flag).expect("first acquire");
    assert!(sync::RunningGuard::try_acquire(&flag).is_none());

    drop(guard);
    assert!(sync::RunningGuard::try_acquire(&flag).is_some());
}

#[test]
fn running_guard_clears_when_cycle_panics() {
    let flag = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let held = std::sync::Arc::clone(&flag);

    let joined = std::thread::spawn(move || {
        let _guard = sync::RunningGuard::try_acquire(&held).expect("acquire");
        panic!("cycle panicked");
    })
    .join();

    assert!(joined.is_err());
    assert!(!flag.load(std::sync::atomic::Ordering::SeqCst));
}
