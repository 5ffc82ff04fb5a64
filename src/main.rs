mod args;


use std::io::{self, Write};
use std::process::ExitCode;

use addir::config::Config;
use addir::directory::Directory;
use addir::entry::{Entry, EntryClass, FinderResult};
use addir::error::Result;
use addir::ldap::establish_connection;
use addir::tiny_directory::TinyDirectory;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::args::{ClassKind, LookupOpts, Mode};


/// Whether `text` can be written as a plain LDIF value (RFC 2849 SAFE-STRING).
fn is_ldif_safe(text: &str) -> bool {
    if text.starts_with(|c: char| c == ' ' || c == ':' || c == '<') || text.ends_with(' ') {
        return false;
    }
    !text.chars().any(|c| c == '\0' || c == '\r' || c == '\n' || !c.is_ascii())
}

fn write_entry<W: Write>(out: &mut W, entry: &Entry) -> io::Result<()> {
    writeln!(out, "dn: {}", entry.dn())?;
    for (name, values) in entry.attributes().iter() {
        for value in values {
            match value.as_str() {
                Some(text) if is_ldif_safe(text) => writeln!(out, "{}: {}", name, text)?,
                _ => writeln!(out, "{}:: {}", name, value.to_base64())?,
            }
        }
    }
    for name in Entry::derived_attribute_names() {
        if let Some(Ok(value)) = entry.derived_attribute(name) {
            writeln!(out, "# {}: {}", name, value)?;
        }
    }
    writeln!(out)
}

async fn lookup<D: Directory>(directory: &mut D, config: &Config, opts: &LookupOpts) -> Result<()> {
    let class = match opts.class {
        ClassKind::Entry => EntryClass::entry(),
        ClassKind::User => config.user_class().entries,
        ClassKind::Group => config.group_class().entries,
    };
    let entries = match class.dispatch_finder(directory, &opts.finder, &opts.pattern).await? {
        FinderResult::One(found) => found.into_iter().collect(),
        FinderResult::Many(found) => found,
    };
    if entries.is_empty() {
        eprintln!("no {} matches {:?}", class.name, opts.pattern);
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for entry in &entries {
        write_entry(&mut out, entry)?;
    }
    Ok(())
}

async fn run() -> Result<()> {
    let mode = Mode::parse();

    match mode {
        Mode::Query(opts) => {
            let mut config = match &opts.config_file {
                Some(path) => Config::load(path)?,
                None => Config::default(),
            };
            if let Some(ldap_uri) = opts.ldap_uri {
                config.connection.ldap_uri = ldap_uri;
            }
            if let Some(base) = opts.base {
                config.connection.base = Some(base);
            }
            if opts.starttls {
                config.connection.starttls = true;
            }

            // obtain credentials
            if let Some(bind_dn) = opts.bind_dn {
                let password = rpassword::prompt_password("LDAP password: ")?;
                config.connection.bind_dn = bind_dn;
                config.connection.password = Some(password);
            }

            let mut connection = establish_connection(&config.connection).await?;
            lookup(&mut connection, &config, &opts.lookup).await
        },
        Mode::Decode(opts) => {
            let ldif_string = std::fs::read_to_string(&opts.ldif_path)?;
            let mut directory = TinyDirectory::from_ldif(opts.base, &ldif_string);
            lookup(&mut directory, &Config::default(), &opts.lookup).await
        },
    }
}


#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        },
    }
}
