use clap::{Parser, Subcommand};
use imgvault_core::constants::{DEFAULT_DATA_DIR, DEFAULT_ROOT_LABEL, DEFAULT_TOKEN_TTL_SECS};
use imgvault_core::{
    duration_secs_from_env_value, CoreConfig, Folder, FolderId, HierarchyService,
    IdentityService, RecordStore, SearchService, TokenSigner, User, VaultError,
};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "imgvault")]
#[command(about = "ImgVault administration CLI")]
struct Cli {
    /// Data directory (defaults to IMGVAULT_DATA_DIR, then imgvault_data)
    #[arg(long, env = "IMGVAULT_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a user
    Signup {
        username: String,
        email: String,
        /// Password (or set IMGVAULT_PASSWORD)
        #[arg(long, env = "IMGVAULT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Print a user's folder tree
    Folders { username: String },
    /// Search a user's images by name
    Search { username: String, query: String },
    /// Check a user's folder hierarchy for cycles and dangling parents
    Check { username: String },
    /// Write a new PKCS#8 PEM token signing key
    GenTokenKey { path: PathBuf },
}

struct Services {
    identity: IdentityService,
    hierarchy: HierarchyService,
    search: SearchService,
    store: Arc<RecordStore>,
}

impl Services {
    fn open(data_dir: PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let root_label =
            std::env::var("IMGVAULT_ROOT_LABEL").unwrap_or_else(|_| DEFAULT_ROOT_LABEL.into());
        let token_ttl = duration_secs_from_env_value(
            "IMGVAULT_TOKEN_TTL_SECS",
            std::env::var("IMGVAULT_TOKEN_TTL_SECS").ok(),
            DEFAULT_TOKEN_TTL_SECS,
        )?;
        let cfg = Arc::new(CoreConfig::new(data_dir, &root_label, token_ttl)?);
        let store = Arc::new(RecordStore::open(&cfg)?);

        // The CLI never issues tokens, so an ephemeral key is enough.
        let signer = Arc::new(TokenSigner::generate());

        Ok(Self {
            identity: IdentityService::new(&cfg, Arc::clone(&store), signer)?,
            hierarchy: HierarchyService::new(Arc::clone(&cfg), Arc::clone(&store)),
            search: SearchService::new(Arc::clone(&store)),
            store,
        })
    }

    fn user(&self, username: &str) -> Result<User, Box<dyn std::error::Error>> {
        match self.identity.find_user(username) {
            Err(VaultError::NotFound) => Err(format!("no such user: {username}").into()),
            other => Ok(other?),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Signup {
            username,
            email,
            password,
        } => {
            let services = Services::open(cli.data_dir)?;
            let user = services.identity.signup(&username, &password, &email)?;
            println!("Created user {} with ID: {}", user.username, user.id);
        }
        Commands::Folders { username } => {
            let services = Services::open(cli.data_dir)?;
            let user = services.user(&username)?;
            let folders = services.hierarchy.list_folders(&user.id)?;
            let images = services.store.list_images(&user.id)?;

            let mut image_counts: HashMap<Option<FolderId>, usize> = HashMap::new();
            for image in &images {
                *image_counts.entry(image.folder_id.clone()).or_default() += 1;
            }

            let root = services.hierarchy.resolve_path(&user.id, None)?;
            let root_label = root.first().map(|s| s.name.as_str()).unwrap_or_default();
            let mut out = std::io::stdout().lock();
            write_tree(&mut out, root_label, &folders, &image_counts)?;
        }
        Commands::Search { username, query } => {
            let services = Services::open(cli.data_dir)?;
            let user = services.user(&username)?;
            let found = services.search.search_images(&user.id, &query)?;
            if found.is_empty() {
                println!("No images found.");
            }
            for image in found {
                println!("ID: {}, Name: {}, URL: {}", image.id, image.name, image.url);
            }
        }
        Commands::Check { username } => {
            let services = Services::open(cli.data_dir)?;
            let user = services.user(&username)?;
            let report = services.hierarchy.verify_hierarchy(&user.id)?;
            println!("Checked {} folders", report.folders_checked);
            if !report.is_healthy() {
                for (id, reason) in &report.corrupt {
                    eprintln!("  {id}: {reason}");
                }
                return Err(format!("{} corrupt folders", report.corrupt.len()).into());
            }
            println!("Hierarchy is healthy");
        }
        Commands::GenTokenKey { path } => {
            let pem = TokenSigner::generate().to_pkcs8_pem()?;
            let mut file = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .map_err(|e| format!("cannot create {}: {e}", path.display()))?;
            file.write_all(pem.as_bytes())?;
            println!("Wrote token signing key to {}", path.display());
        }
    }

    Ok(())
}

/// Writes the folder tree, children sorted as listed (creation time, then id).
fn write_tree(
    out: &mut impl Write,
    root_label: &str,
    folders: &[Folder],
    image_counts: &HashMap<Option<FolderId>, usize>,
) -> std::io::Result<()> {
    let mut children: HashMap<Option<&FolderId>, Vec<&Folder>> = HashMap::new();
    for folder in folders {
        children
            .entry(folder.parent_folder_id.as_ref())
            .or_default()
            .push(folder);
    }

    writeln!(
        out,
        "{} ({} images)",
        root_label,
        image_counts.get(&None).copied().unwrap_or(0)
    )?;

    let mut stack: Vec<(&Folder, usize)> = children
        .get(&None)
        .map(|roots| roots.iter().rev().map(|f| (*f, 1)).collect())
        .unwrap_or_default();

    while let Some((folder, depth)) = stack.pop() {
        writeln!(
            out,
            "{}{} ({} images)  [{}]",
            "  ".repeat(depth),
            folder.name,
            image_counts
                .get(&Some(folder.id.clone()))
                .copied()
                .unwrap_or(0),
            folder.id
        )?;

        if depth > folders.len() {
            continue;
        }
        if let Some(kids) = children.get(&Some(&folder.id)) {
            stack.extend(kids.iter().rev().map(|f| (*f, depth + 1)));
        }
    }

    Ok(())
}
