use super::{path_manager, prompts};
use crate::output::Output;
use crate::ConfigCommands;
use color_eyre::Result;
use comfy_table::{Cell, Table};
use lecture_config::{storage_locations, Config, CredentialStore, PathManager};
use owo_colors::OwoColorize;
use serde_json::json;
use std::path::PathBuf;

pub async fn run_config(cmd: ConfigCommands, output: &Output) -> Result<()> {
    let paths = path_manager();
    match cmd {
        ConfigCommands::Show { full } => show_config(&paths, full, output),
        ConfigCommands::Credentials { code } => configure_credentials(&paths, code, output),
        ConfigCommands::SetDestination { path } => set_destination(&paths, path, output),
        ConfigCommands::Init { force } => init_config(&paths, force, output),
    }
}

fn load_existing(paths: &PathManager) -> Result<Config> {
    let config_file = paths.config_file();
    Config::load_or_default(&config_file)
        .map_err(|e| color_eyre::eyre::eyre!("Failed to load config from {}: {}", config_file.display(), e))
}

fn save(paths: &PathManager, config: &Config) -> Result<()> {
    let config_file = paths.config_file();
    config
        .save_to_file(&config_file)
        .map_err(|e| color_eyre::eyre::eyre!("Failed to save config to {}: {}", config_file.display(), e))
}

fn load_credentials(paths: &PathManager) -> Result<CredentialStore> {
    let credentials_file = paths.credentials_file();
    let mut store = CredentialStore::new(credentials_file.clone());
    store
        .load()
        .map_err(|e| color_eyre::eyre::eyre!("Failed to load credentials from {}: {}", credentials_file.display(), e))?;
    Ok(store)
}

fn show_config(paths: &PathManager, full: bool, output: &Output) -> Result<()> {
    let config_file = paths.config_file();
    if !config_file.exists() {
        output.warn(format!("Configuration file not found at: {}", config_file.display()));
        output.info("Defaults are in effect. Run 'lecturefetch config init' to write them out.");
    }
    let config = load_existing(paths)?;
    let login = load_credentials(paths)?.login();

    let code = login.as_ref().map(|l| l.institution_code.clone());
    let password = login.as_ref().map(|l| {
        if full {
            l.password.clone()
        } else {
            mask_string(&l.password)
        }
    });

    if !output.is_human() {
        output.json(&json!({
            "type": "config",
            "config_file": config_file,
            "config": config,
            "login": { "institution_code": code, "password": password },
        }));
        return Ok(());
    }
    if output.is_quiet() {
        return Ok(());
    }

    println!("\n{}", "Configuration".bright_cyan().bold());
    println!("{} {}\n", "File:".bright_white(), config_file.display());

    let downloads = &config.downloads;
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    table.set_header(vec![
        Cell::new("Setting").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Value").add_attribute(comfy_table::Attribute::Bold),
    ]);
    let rows: Vec<(&str, String)> = vec![
        ("Login URL", config.site.login_url.clone()),
        ("Institution code", code.unwrap_or_else(|| "(not set)".to_string())),
        ("Password", password.unwrap_or_else(|| "(not set)".to_string())),
        ("Headless browser", config.browser.headless.to_string()),
        ("Browser temp folder", downloads.temp_dir.display().to_string()),
        ("Library folder", downloads.final_download_dir().display().to_string()),
        ("Poll interval", format!("{}s", downloads.poll_interval_secs)),
        ("Ready timeout", format!("{}s", downloads.ready_timeout_secs)),
        ("Move attempts", downloads.relocate_attempts.to_string()),
        ("Partial suffixes", downloads.partial_suffixes.join(", ")),
        ("Match mode", format!("{:?}", downloads.match_mode).to_lowercase()),
        ("Topics file", config.topics.file.display().to_string()),
    ];
    for (name, value) in rows {
        table.add_row(vec![Cell::new(name), Cell::new(value)]);
    }
    println!("{}", table);
    Ok(())
}

fn configure_credentials(paths: &PathManager, code_arg: Option<String>, output: &Output) -> Result<()> {
    paths
        .ensure_directories()
        .map_err(|e| color_eyre::eyre::eyre!("Failed to create configuration directories: {}", e))?;
    let mut store = load_credentials(paths)?;

    let code = match code_arg {
        Some(code) => code,
        None => {
            let existing = store.get("institution_code").cloned();
            prompts::prompt_string("Institution code", existing.as_deref())?
        }
    };
    let code = code.trim().to_string();
    if code.is_empty() {
        return Err(color_eyre::eyre::eyre!("Institution code is required"));
    }

    let password = prompts::prompt_password("Password")?;
    if password.is_empty() {
        return Err(color_eyre::eyre::eyre!("Password is required"));
    }

    store.set_login(code.clone(), password);
    store
        .save()
        .map_err(|e| color_eyre::eyre::eyre!("Failed to save credentials: {}", e))?;

    output.success("Login saved");
    output.info(format!("  Institution code: {}", code));
    Ok(())
}

fn set_destination(paths: &PathManager, path_arg: Option<PathBuf>, output: &Output) -> Result<()> {
    let destination = match path_arg {
        Some(path) => path,
        None => {
            let locations = storage_locations();
            if locations.is_empty() {
                return Err(color_eyre::eyre::eyre!("No storage locations found; pass --path"));
            }
            let labels: Vec<String> = locations
                .iter()
                .map(|l| format!("{} ({})", l.label, l.path.display()))
                .collect();
            match prompts::select("Save downloads under", &labels)? {
                Some(index) => locations[index].path.clone(),
                None => {
                    output.info("Destination unchanged");
                    return Ok(());
                }
            }
        }
    };

    if !destination.is_dir() {
        return Err(color_eyre::eyre::eyre!("{} is not a directory", destination.display()));
    }

    let mut config = load_existing(paths)?;
    config.downloads.destination_root = destination;
    save(paths, &config)?;

    output.success(format!(
        "Downloads will be saved to {}",
        config.downloads.final_download_dir().display()
    ));
    Ok(())
}

fn init_config(paths: &PathManager, force: bool, output: &Output) -> Result<()> {
    let config_file = paths.config_file();
    if config_file.exists() && !force {
        output.warn(format!(
            "Configuration already exists at {} (use --force to overwrite)",
            config_file.display()
        ));
        return Ok(());
    }
    paths
        .ensure_directories()
        .map_err(|e| color_eyre::eyre::eyre!("Failed to create configuration directories: {}", e))?;
    save(paths, &Config::default())?;
    output.success(format!("Wrote default configuration to {}", config_file.display()));
    Ok(())
}

fn mask_string(s: &str) -> String {
    let count = s.chars().count();
    if count <= 4 {
        return "*".repeat(count);
    }
    let visible: String = s.chars().take(2).collect();
    format!("{}{}", visible, "*".repeat(count - 2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_string() {
        assert_eq!(mask_string("abc"), "***");
        assert_eq!(mask_string("secret99"), "se******");
    }

    #[test]
    fn test_init_does_not_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let paths = PathManager::from_base(dir.path());
        let output = Output::new(crate::output::OutputFormat::Human, true);

        let mut custom = Config::default();
        custom.downloads.subfolder = "Custom".to_string();
        save(&paths, &custom).unwrap();

        init_config(&paths, false, &output).unwrap();
        assert_eq!(load_existing(&paths).unwrap().downloads.subfolder, "Custom");

        init_config(&paths, true, &output).unwrap();
        assert_eq!(
            load_existing(&paths).unwrap().downloads.subfolder,
            Config::default().downloads.subfolder
        );
    }

    #[test]
    fn test_set_destination_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let library = tempfile::tempdir().unwrap();
        let paths = PathManager::from_base(dir.path());
        let output = Output::new(crate::output::OutputFormat::Human, true);

        set_destination(&paths, Some(library.path().to_path_buf()), &output).unwrap();
        assert_eq!(load_existing(&paths).unwrap().downloads.destination_root, library.path());

        let missing = library.path().join("missing");
        assert!(set_destination(&paths, Some(missing), &output).is_err());
    }
}
