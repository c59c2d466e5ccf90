use uag_domain::config::{Config, ConfigSeverity};

/// Run all diagnostic checks and print a summary.
///
/// Returns `Ok(true)` when every check passes, `Ok(false)` when at least
/// one check failed.
pub fn run(config: &Config, config_path: &str) -> anyhow::Result<bool> {
    println!("unified-agent-gateway doctor");
    println!("============================\n");

    let mut all_passed = true;

    check_config_file(config_path, &mut all_passed);
    check_config_validation(config, &mut all_passed);
    check_workspace(config, &mut all_passed);
    check_api_token(config);

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    Ok(all_passed)
}

fn check_config_file(config_path: &str, all_passed: &mut bool) {
    let exists = std::path::Path::new(config_path).exists();
    print_check(
        "Config file exists",
        exists,
        if exists {
            config_path.to_owned()
        } else {
            format!("{config_path} not found (using defaults)")
        },
    );
    if !exists {
        *all_passed = false;
    }
}

fn check_config_validation(config: &Config, all_passed: &mut bool) {
    let issues = config.validate();
    let error_count = issues.iter().filter(|e| e.severity == ConfigSeverity::Error).count();

    if issues.is_empty() {
        print_check("Config validation", true, "no issues".into());
    } else {
        print_check(
            "Config validation",
            error_count == 0,
            format!("{} issue(s) ({error_count} error(s))", issues.len()),
        );
        for issue in &issues {
            println!("      {issue}");
        }
        if error_count > 0 {
            *all_passed = false;
        }
    }
}

fn check_workspace(config: &Config, all_passed: &mut bool) {
    let path = &config.workspace.data_dir;
    if std::fs::create_dir_all(path).is_err() {
        print_check("Workspace directory", false, format!("{} (cannot create)", path.display()));
        *all_passed = false;
        return;
    }

    let probe = path.join(".uag_doctor_probe");
    let writable = std::fs::write(&probe, b"probe").is_ok();
    let _ = std::fs::remove_file(&probe);

    print_check(
        "Workspace directory",
        writable,
        if writable {
            format!("{} (writable)", path.display())
        } else {
            format!("{} (not writable)", path.display())
        },
    );
    if !writable {
        *all_passed = false;
    }
}

/// Informational only — an absent token is a valid dev-mode configuration,
/// not a failed check (§4.1 "dev mode").
fn check_api_token(config: &Config) {
    let configured = std::env::var(&config.server.api_token_env)
        .map(|v| !v.is_empty())
        .unwrap_or(false);
    print_check(
        "API token",
        true,
        if configured {
            format!("configured via {}", config.server.api_token_env)
        } else {
            format!("not set ({} unset, running unauthenticated)", config.server.api_token_env)
        },
    );
}

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}
