use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, ValueEnum};


#[derive(Clone, Debug, Eq, Hash, Ord, Parser, PartialEq, PartialOrd)]
#[command(version, about = "Looks up Active Directory users and groups")]
pub enum Mode {
    /// Query a live directory.
    Query(QueryOpts),

    /// Query an LDIF export.
    Decode(DecodeOpts),
}


#[derive(Args, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[command(group(ArgGroup::new("auth").required(true).args(["bind_dn", "config_file"])))]
pub struct QueryOpts {
    #[arg(short = 'H', long, required_unless_present = "config_file")]
    pub ldap_uri: Option<String>,

    #[arg(short = 'D', long)]
    pub bind_dn: Option<String>,

    /// TOML file with a `[connection]` table and optional class overrides.
    #[arg(short = 'c', long = "config")]
    pub config_file: Option<PathBuf>,

    /// Search base; defaults to the server's default naming context.
    #[arg(short = 'b', long)]
    pub base: Option<String>,

    #[arg(short = 'Z', long)]
    pub starttls: bool,

    #[command(flatten)]
    pub lookup: LookupOpts,
}


#[derive(Args, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct DecodeOpts {
    pub ldif_path: PathBuf,

    /// Search base within the export.
    #[arg(short = 'b', long, default_value = "")]
    pub base: String,

    #[command(flatten)]
    pub lookup: LookupOpts,
}


#[derive(Args, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct LookupOpts {
    #[arg(long, value_enum, default_value_t = ClassKind::User)]
    pub class: ClassKind,

    /// Finder to run, e.g. `find_by_mail` or `find_all_by_sn`.
    #[arg(short = 'f', long, default_value = "find")]
    pub finder: String,

    /// Value to look for; `*` is a wildcard.
    pub pattern: String,
}


#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, ValueEnum)]
pub enum ClassKind {
    Entry,
    User,
    Group,
}
