// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("appdb")
        .version(env!("CARGO_PKG_VERSION"))
        .author("appdb Contributors")
        .about("Cross-package-manager database of organization-managed apps")
        .subcommand_required(false)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Verbose output"),
        )
        .subcommand(
            Command::new("check-sources")
                .about("Check that every package source is configured to match the manifest"),
        )
        .subcommand(
            Command::new("update-source")
                .about("Regenerate package-source configuration from the manifest (requires root)"),
        )
        .subcommand(
            Command::new("update-db").about("Rebuild the app catalog from the remote manifest"),
        )
        .subcommand(
            Command::new("update").about(
                "Regenerate sources, rebuild the catalog, and rescan installed apps (requires root)",
            ),
        )
        .subcommand(
            Command::new("update-installed")
                .about("Rebuild the installed-apps table by querying every package source"),
        )
        .subcommand(
            Command::new("get-db-location").about("Print the location of the database file"),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    // Generate main man page
    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("appdb.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");

    println!("cargo:warning=Man page generated at {}", man_path.display());
}
