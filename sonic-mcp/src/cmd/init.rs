//! `sonic-mcp init` command — generate a default TOML configuration file.

use std::fs;
use std::path::Path;

use crate::config::generate_default_config;
use crate::error::Error;

/// Execute the `init` command.
///
/// Refuses to overwrite an existing file unless `force` is `true`.
///
/// # Errors
///
/// Returns an error if the file already exists (without `--force`) or if
/// writing fails.
#[allow(clippy::print_stderr)]
pub fn run(output: &Path, force: bool) -> Result<(), Error> {
    if output.exists() && !force {
        return Err(Error::config(format!(
            "'{}' already exists, use --force to overwrite",
            output.display()
        )));
    }

    fs::write(output, generate_default_config())
        .map_err(|e| Error::config_with(format!("failed to write '{}'", output.display()), e))?;

    eprintln!("Config file written to {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_to_overwrite_without_force() {
        let path = std::env::temp_dir().join(format!("sonic-mcp-init-{}.toml", std::process::id()));
        run(&path, false).expect("first write");
        assert!(matches!(run(&path, false), Err(Error::Config(_))));
        assert!(run(&path, true).is_ok());
        let written = fs::read_to_string(&path).expect("read back");
        assert_eq!(written, generate_default_config());
        let _ = fs::remove_file(&path);
    }
}
