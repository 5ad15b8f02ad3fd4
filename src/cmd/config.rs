//! Configuration view and init commands — `codedrop config`.

use codedrop::settings;
use anyhow::Result;
use std::path::Path;

use super::super::ConfigCommands;

pub fn cmd_config(project_root: Option<&Path>, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            let (path, content) = settings::show_config()?;
            println!();
            println!("Codedrop Configuration");
            println!("======================");
            println!();
            match content {
                Some(content) => {
                    println!("Config file: {}", path.display());
                    println!();
                    print!("{content}");
                }
                None => {
                    println!("No config file found at {}", path.display());
                    println!();
                    println!("Defaults in effect:");
                    println!();
                    print!("{}", settings::default_config_toml(None));
                    println!();
                    println!("Run 'codedrop config init' to create one.");
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            let path = settings::init_config_file(project_root)?;
            println!("Created {}", path.display());
        }
    }
    Ok(())
}
