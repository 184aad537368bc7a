use color_eyre::Result;
use dialoguer::{Confirm, Input, MultiSelect, Password, Select};

// dialoguer blocks on the terminal; callers run on the multi-threaded
// runtime, so hand the worker thread over while waiting for input.
fn blocking<T>(f: impl FnOnce() -> dialoguer::Result<T>) -> Result<T> {
    tokio::task::block_in_place(f).map_err(|e| color_eyre::eyre::eyre!("Failed to read input: {}", e))
}

/// Prompt for a string value with optional default
pub fn prompt_string(prompt: &str, default: Option<&str>) -> Result<String> {
    let mut input_builder = Input::<String>::new().with_prompt(prompt).allow_empty(true);
    if let Some(default_value) = default {
        input_builder = input_builder.default(default_value.to_string());
    }
    blocking(|| input_builder.interact_text())
}

/// Prompt for a password (masked input)
pub fn prompt_password(prompt: &str) -> Result<String> {
    blocking(|| Password::new().with_prompt(prompt).interact())
}

pub fn prompt_yes_no(prompt: &str, default: bool) -> Result<bool> {
    blocking(|| Confirm::new().with_prompt(prompt).default(default).interact())
}

/// Pick one entry; `None` when the user escapes out
pub fn select<T: ToString>(prompt: &str, items: &[T]) -> Result<Option<usize>> {
    blocking(|| Select::new().with_prompt(prompt).items(items).default(0).interact_opt())
}

/// Pick any number of entries with space, confirm with enter
pub fn multi_select<T: ToString>(prompt: &str, items: &[T]) -> Result<Vec<usize>> {
    let chosen = blocking(|| MultiSelect::new().with_prompt(prompt).items(items).interact_opt())?;
    Ok(chosen.unwrap_or_default())
}
