// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: bundle identifier
fn bundle_arg() -> Arg {
    Arg::new("bundle").required(true).help("Bundle identifier")
}

/// Common argument: bundle version
fn version_arg() -> Arg {
    Arg::new("version")
        .short('v')
        .long("version")
        .value_name("N")
        .help("Bundle version (latest if omitted)")
}

fn build_cli() -> Command {
    Command::new("rdfbundle")
        .version(env!("CARGO_PKG_VERSION"))
        .author("rdfbundle Contributors")
        .about("Build, publish, fetch and install bundles of RDF graph data")
        .arg(
            Arg::new("project_dir")
                .short('p')
                .long("project-dir")
                .default_value(".rdfbundle")
                .help("Project directory holding config.toml and remotes/"),
        )
        .arg(
            Arg::new("bundles_dir")
                .short('b')
                .long("bundles-dir")
                .help("Bundles directory (overrides config.toml and RDFBUNDLE_BUNDLES_DIR)"),
        )
        .subcommand(
            Command::new("install")
                .about("Install a bundle from a descriptor and an N-Quads dump")
                .arg(Arg::new("descriptor").required(true).help("Descriptor YAML file"))
                .arg(
                    Arg::new("source")
                        .short('s')
                        .long("source")
                        .required(true)
                        .help("N-Quads file holding the source contexts"),
                )
                .arg(
                    Arg::new("source_dir")
                        .long("source-dir")
                        .default_value(".")
                        .help("Directory the descriptor's file selections are relative to"),
                )
                .arg(
                    Arg::new("imports_context")
                        .long("imports-context")
                        .help("Context holding the imports relation; enables the dependency check"),
                )
                .arg(
                    Arg::new("default_context")
                        .long("default-context")
                        .help("Default context recorded in the manifest"),
                ),
        )
        .subcommand(
            Command::new("fetch")
                .about("Fetch a bundle from the project's remotes")
                .arg(bundle_arg())
                .arg(version_arg()),
        )
        .subcommand(
            Command::new("contexts")
                .about("List the contexts in a bundle")
                .arg(bundle_arg())
                .arg(version_arg()),
        )
        .subcommand(
            Command::new("versions")
                .about("List installed versions of a bundle")
                .arg(bundle_arg())
                .arg(
                    Arg::new("remote")
                        .short('r')
                        .long("remote")
                        .action(ArgAction::SetTrue)
                        .help("Also ask every remote which versions it offers"),
                ),
        )
        .subcommand(
            Command::new("pack")
                .about("Pack an installed bundle into a .tar.xz archive")
                .arg(bundle_arg())
                .arg(version_arg())
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .required(true)
                        .help("Output archive path"),
                ),
        )
        .subcommand(
            Command::new("verify")
                .about("Check an installed bundle against its recorded hashes")
                .arg(bundle_arg())
                .arg(version_arg()),
        )
        .subcommand(
            Command::new("remote-add")
                .about("Add a remote (or a URL to an existing remote)")
                .arg(Arg::new("name").required(true).help("Remote name"))
                .arg(
                    Arg::new("url")
                        .required(true)
                        .help("Index URL (http://, https:// or file://)"),
                ),
        )
        .subcommand(Command::new("remote-list").about("List configured remotes"))
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("rdfbundle.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
