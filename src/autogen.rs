//! Revision generation.
//!
//! Compares the registered view definitions with what the database holds
//! and writes a new revision module that moves the database to the declared
//! definitions. The new module is registered in the chain in
//! `migration/mod.rs`.

use std::fmt::{self, Write as _};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, DbErr, TransactionTrait};
use tracing::{info, warn};

use crate::inspect;
use crate::migration::Migrator;
use crate::runner;
use crate::views::{ViewDefinition, normalize_sql, select_from_create};

/// A view as the database currently defines it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSnapshot {
    pub name: String,
    pub columns: Vec<String>,
    pub select: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewChange {
    /// Declared but absent from the database.
    Create(ViewDefinition),
    /// Present with a different definition.
    Replace {
        view: ViewDefinition,
        previous: ViewSnapshot,
    },
}

impl ViewChange {
    pub fn view(&self) -> &ViewDefinition {
        match self {
            ViewChange::Create(view) | ViewChange::Replace { view, .. } => view,
        }
    }
}

/// Lists the registered views whose declared definition differs from the
/// database.
pub async fn detect_view_changes(
    db: &DatabaseConnection,
    views: &[ViewDefinition],
) -> Result<Vec<ViewChange>, DbErr> {
    let mut changes = Vec::new();
    for view in views {
        if !inspect::view_exists(db, view.name).await? {
            info!(view = view.name, "detected added view");
            changes.push(ViewChange::Create(*view));
            continue;
        }

        let Some(stored_select) = stored_select_if_changed(db, view).await? else {
            continue;
        };
        warn!(view = view.name, "detected changed view definition");
        let previous = ViewSnapshot {
            name: view.name.to_string(),
            columns: inspect::columns(db, view.name).await?,
            select: stored_select,
        };
        changes.push(ViewChange::Replace {
            view: *view,
            previous,
        });
    }
    Ok(changes)
}

/// Returns the stored query when it differs from `view`, `None` when equal.
async fn stored_select_if_changed(
    db: &DatabaseConnection,
    view: &ViewDefinition,
) -> Result<Option<String>, DbErr> {
    match db.get_database_backend() {
        DbBackend::Postgres => {
            // Postgres rewrites view queries, so the declared query is
            // installed under a probe name to get the same rendering.
            let probe = format!("{}__autogen_probe", view.name);
            let txn = db.begin().await?;
            txn.execute_unprepared(&format!("CREATE VIEW {probe} AS\n{}", view.select.trim()))
                .await?;
            let declared = inspect::view_sql(&txn, &probe).await?;
            let stored = inspect::view_sql(&txn, view.name).await?;
            txn.rollback().await?;

            let stored = stored.unwrap_or_default();
            let same = declared.as_deref().map(normalize_sql) == Some(normalize_sql(&stored));
            Ok((!same).then(|| stored.trim().trim_end_matches(';').to_string()))
        }
        DbBackend::Sqlite => {
            let stored = inspect::view_sql(db, view.name).await?.unwrap_or_default();
            if normalize_sql(&stored) == normalize_sql(&view.create_sql()) {
                return Ok(None);
            }
            let select = select_from_create(&stored).unwrap_or(&stored);
            Ok(Some(select.to_string()))
        }
        other => Err(DbErr::Custom(format!(
            "view autogeneration is not supported on {other:?}"
        ))),
    }
}

/// Input for [`render_revision`].
#[derive(Debug, Clone)]
pub struct RevisionDraft {
    pub module: String,
    pub id: String,
    pub down_revision: Option<String>,
    pub message: String,
    pub created: DateTime<Utc>,
    pub changes: Vec<ViewChange>,
}

impl RevisionDraft {
    pub fn new(
        message: &str,
        down_revision: Option<String>,
        changes: Vec<ViewChange>,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            module: module_name(&created, message),
            id: revision_id(&created),
            down_revision,
            message: message.to_string(),
            created,
            changes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedRevision {
    pub path: PathBuf,
    pub module: String,
    pub id: String,
    pub message: String,
    pub changes: usize,
}

/// Writes a new revision into `dir`, the directory holding the chain's
/// `mod.rs`.
///
/// With `autogenerate` the revision carries the detected view changes and
/// nothing is written when there are none; the database must be at head.
/// Without it an empty revision is written.
pub async fn generate_revision(
    db: &DatabaseConnection,
    dir: &Path,
    message: &str,
    autogenerate: bool,
    views: &[ViewDefinition],
) -> Result<Option<GeneratedRevision>> {
    let head = Migrator::head();
    let changes = if autogenerate {
        let current = runner::current(db).await?;
        if current != head {
            bail!(
                "target database is not up to date (at {}, head is {})",
                current.map_or("<base>", |r| r.id),
                head.map_or("<base>", |r| r.id)
            );
        }
        detect_view_changes(db, views).await?
    } else {
        Vec::new()
    };

    if autogenerate && changes.is_empty() {
        info!("no changes detected");
        return Ok(None);
    }

    let draft = RevisionDraft::new(
        message,
        head.map(|r| r.id.to_string()),
        changes,
        Utc::now(),
    );
    write_revision(dir, &draft).map(Some)
}

pub fn write_revision(dir: &Path, draft: &RevisionDraft) -> Result<GeneratedRevision> {
    let mod_path = dir.join("mod.rs");
    let path = dir.join(format!("{}.rs", draft.module));
    if path.exists() {
        bail!("revision file already exists: {}", path.display());
    }

    let mod_source = fs::read_to_string(&mod_path)
        .with_context(|| format!("read revision chain: {}", mod_path.display()))?;
    let updated = register_in_mod(&mod_source, &draft.module)?;

    let source = render_revision(draft).context("render revision source")?;
    fs::write(&path, source)
        .with_context(|| format!("write revision file: {}", path.display()))?;
    fs::write(&mod_path, updated)
        .with_context(|| format!("update revision chain: {}", mod_path.display()))?;

    info!(path = %path.display(), revision = %draft.id, "generated revision");
    Ok(GeneratedRevision {
        path,
        module: draft.module.clone(),
        id: draft.id.clone(),
        message: draft.message.clone(),
        changes: draft.changes.len(),
    })
}

/// Adds the module declaration and the chain entry for `module`.
pub fn register_in_mod(source: &str, module: &str) -> Result<String> {
    if source.contains(&format!("mod {module};")) {
        bail!("revision {module} is already registered");
    }

    let mut lines: Vec<String> = source.lines().map(str::to_string).collect();
    let mod_idx = lines
        .iter()
        .rposition(|l| l.trim_start().starts_with("mod m"))
        .context("no revision module declarations found")?;
    let entry_idx = lines
        .iter()
        .rposition(|l| l.trim_start().starts_with("revision!("))
        .context("no revision chain entries found")?;

    let indent: String = lines[entry_idx]
        .chars()
        .take_while(|c| c.is_whitespace())
        .collect();
    let entry = format!("{indent}revision!({module}),");
    let decl = format!("mod {module};");

    // Insert the later line first so the earlier index stays valid.
    if entry_idx > mod_idx {
        lines.insert(entry_idx + 1, entry);
        lines.insert(mod_idx + 1, decl);
    } else {
        lines.insert(mod_idx + 1, decl);
        lines.insert(entry_idx + 1, entry);
    }

    let mut out = lines.join("\n");
    out.push('\n');
    Ok(out)
}

pub fn render_revision(draft: &RevisionDraft) -> Result<String, fmt::Error> {
    let mut out = String::new();
    let summary = draft.message.replace(['\r', '\n'], " ");

    writeln!(out, "//! {summary}")?;
    writeln!(out, "//!")?;
    writeln!(out, "//! Revision ID: {}", draft.id)?;
    writeln!(
        out,
        "//! Revises: {}",
        draft.down_revision.as_deref().unwrap_or("")
    )?;
    writeln!(
        out,
        "//! Create Date: {}",
        draft.created.format("%Y-%m-%d %H:%M:%S")
    )?;
    out.push('\n');
    out.push_str("use sea_orm_migration::prelude::*;\n\n");
    out.push_str("use super::Revision;\n");
    if !draft.changes.is_empty() {
        out.push_str("use crate::views::{self, ViewDefinition};\n");
    }
    out.push('\n');

    writeln!(out, "pub const REVISION: Revision = Revision {{")?;
    writeln!(out, "    id: {:?},", draft.id)?;
    match &draft.down_revision {
        Some(parent) => writeln!(out, "    down_revision: Some({parent:?}),")?,
        None => writeln!(out, "    down_revision: None,")?,
    }
    writeln!(out, "    message: {:?},", draft.message)?;
    out.push_str("};\n\n");

    let mut up = Vec::new();
    let mut down = Vec::new();
    for change in &draft.changes {
        let view = change.view();
        let new_const = const_name(view.name, "NEW");
        render_definition(&mut out, &new_const, view.name, view.columns, view.select)?;
        match change {
            ViewChange::Create(_) => {
                up.push(format!("views::create_view(manager, &{new_const}).await?;"));
                down.push(format!("views::drop_view(manager, &{new_const}).await?;"));
            }
            ViewChange::Replace { previous, .. } => {
                let old_const = const_name(view.name, "OLD");
                let columns: Vec<&str> = previous.columns.iter().map(String::as_str).collect();
                render_definition(&mut out, &old_const, &previous.name, &columns, &previous.select)?;
                up.push(format!(
                    "views::replace_view(manager, &{old_const}, &{new_const}).await?;"
                ));
                down.push(format!(
                    "views::replace_view(manager, &{new_const}, &{old_const}).await?;"
                ));
            }
        }
    }
    down.reverse();

    out.push_str("#[derive(DeriveMigrationName)]\npub struct Migration;\n\n");
    out.push_str("#[async_trait::async_trait]\nimpl MigrationTrait for Migration {\n");
    render_step(&mut out, "up", &up)?;
    out.push('\n');
    render_step(&mut out, "down", &down)?;
    out.push_str("}\n");
    Ok(out)
}

fn render_definition(
    out: &mut String,
    ident: &str,
    name: &str,
    columns: &[&str],
    select: &str,
) -> fmt::Result {
    writeln!(out, "const {ident}: ViewDefinition = ViewDefinition {{")?;
    writeln!(out, "    name: {name:?},")?;
    writeln!(out, "    columns: &{columns:?},")?;
    writeln!(out, "    select: {},", raw_literal(select.trim()))?;
    out.push_str("};\n\n");
    Ok(())
}

fn render_step(out: &mut String, step: &str, statements: &[String]) -> fmt::Result {
    let param = if statements.is_empty() { "_manager" } else { "manager" };
    writeln!(
        out,
        "    async fn {step}(&self, {param}: &SchemaManager) -> Result<(), DbErr> {{"
    )?;
    for statement in statements {
        writeln!(out, "        {statement}")?;
    }
    out.push_str("        Ok(())\n    }\n");
    Ok(())
}

fn raw_literal(text: &str) -> String {
    let mut hashes = 1;
    while text.contains(&format!("\"{}", "#".repeat(hashes))) {
        hashes += 1;
    }
    let fence = "#".repeat(hashes);
    format!("r{fence}\"{text}\"{fence}")
}

fn const_name(view: &str, suffix: &str) -> String {
    let base: String = view
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("{base}_{suffix}")
}

/// Lowercase words of `message` joined by underscores.
pub fn slug(message: &str) -> String {
    let words: Vec<String> = message
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_ascii_lowercase)
        .collect();
    let mut slug = String::new();
    for word in words {
        if !slug.is_empty() && slug.len() + word.len() + 1 > 40 {
            break;
        }
        if !slug.is_empty() {
            slug.push('_');
        }
        slug.push_str(&word);
    }
    if slug.is_empty() {
        slug.push_str("revision");
    }
    slug.truncate(40);
    slug
}

pub fn module_name(created: &DateTime<Utc>, message: &str) -> String {
    format!("m{}_{}", created.format("%Y%m%d_%H%M%S"), slug(message))
}

/// Twelve hex digits taken from the creation timestamp.
pub fn revision_id(created: &DateTime<Utc>) -> String {
    let nanos = created.timestamp_nanos_opt().unwrap_or_default() as u64;
    format!("{:012x}", nanos & 0xffff_ffff_ffff)
}
