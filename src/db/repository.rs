//! Database repository for CRUD operations.
//!
//! Every entity save runs its validation reads, field writes and the full
//! replacement of its content entries inside one transaction.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};

use crate::content::{codec, hierarchy, slug, Catalog};
use crate::errors::{AppError, FieldErrors};
use crate::models::{
    ComponentKind, ComponentTemplate, CreateEntityRequest, CreateTemplateRequest, Entity,
    Paginated, PreparedEntry, StoredEntry, TaxonomyKind, UpdateEntityRequest,
};

const ENTITY_COLUMNS: &str =
    "id, kind, slug, name, title, description, parent_id, created_at, updated_at";

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Start a write transaction. The SQLite write lock is taken at `BEGIN`,
    /// so concurrent saves wait on the busy timeout instead of failing with
    /// `SQLITE_BUSY` when they upgrade from a read.
    async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>, AppError> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    // ==================== CATALOG OPERATIONS ====================

    /// List all component templates.
    pub async fn list_templates(&self) -> Result<Vec<ComponentTemplate>, AppError> {
        let mut conn = self.pool.acquire().await?;
        load_templates(&mut conn).await
    }

    /// Snapshot of the catalog for resolving builder elements.
    pub async fn catalog(&self) -> Result<Catalog, AppError> {
        Ok(Catalog::new(self.list_templates().await?))
    }

    /// Add a template to the catalog.
    pub async fn create_template(
        &self,
        request: &CreateTemplateRequest,
    ) -> Result<ComponentTemplate, AppError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(AppError::field("name", "Name is required"));
        }

        let existing = sqlx::query("SELECT id FROM component_templates WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        if existing.is_some() {
            return Err(AppError::field("name", "A component with this name already exists"));
        }

        let kind = ComponentKind::parse(request.kind.as_deref().unwrap_or(name).trim());
        let template = ComponentTemplate {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: request
                .description
                .clone()
                .unwrap_or_else(|| kind.label().to_string()),
            kind,
        };

        sqlx::query(
            "INSERT INTO component_templates (id, name, description, type) VALUES (?, ?, ?, ?)",
        )
        .bind(&template.id)
        .bind(&template.name)
        .bind(&template.description)
        .bind(template.kind.as_str())
        .execute(&self.pool)
        .await?;

        if !template.kind.is_known() {
            tracing::info!(name = %template.name, "Template type has no renderer, its blocks will not be shown");
        }
        tracing::info!(id = %template.id, name = %template.name, "Component template created");
        Ok(template)
    }

    /// Remove a template that no content entry references.
    pub async fn delete_template(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.begin_write().await?;

        let in_use: i64 =
            sqlx::query("SELECT COUNT(*) AS uses FROM content_entries WHERE component_id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?
                .get("uses");
        if in_use > 0 {
            return Err(AppError::Conflict(format!(
                "Component {} is used by {} content entries",
                id, in_use
            )));
        }

        let result = sqlx::query("DELETE FROM component_templates WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Component {} not found", id)));
        }

        tx.commit().await?;
        Ok(())
    }

    // ==================== ENTITY OPERATIONS ====================

    /// List one page of entities of a kind, ordered by name.
    pub async fn list_entities(
        &self,
        kind: TaxonomyKind,
        page: u32,
        per_page: u32,
    ) -> Result<Paginated<Entity>, AppError> {
        let page = page.max(1);
        let offset = i64::from(page - 1) * i64::from(per_page);
        let mut conn = self.pool.acquire().await?;

        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM entities WHERE kind = ?")
            .bind(kind.as_str())
            .fetch_one(&mut *conn)
            .await?
            .get("total");

        let rows = sqlx::query(&format!(
            "SELECT {} FROM entities WHERE kind = ? ORDER BY name COLLATE NOCASE, id LIMIT ? OFFSET ?",
            ENTITY_COLUMNS
        ))
        .bind(kind.as_str())
        .bind(i64::from(per_page))
        .bind(offset)
        .fetch_all(&mut *conn)
        .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut entity = entity_from_row(row)?;
            attach_personas(&mut conn, &mut entity).await?;
            items.push(entity);
        }

        Ok(Paginated {
            items,
            page,
            per_page,
            total,
        })
    }

    /// List every entity of every kind.
    pub async fn list_all_entities(&self) -> Result<Vec<Entity>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM entities ORDER BY kind, name",
            ENTITY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(entity_from_row).collect()
    }

    /// Get an entity by id.
    pub async fn get_entity(
        &self,
        kind: TaxonomyKind,
        id: &str,
    ) -> Result<Option<Entity>, AppError> {
        let mut conn = self.pool.acquire().await?;
        fetch_entity(&mut conn, kind, "id", id).await
    }

    /// Get an entity by id, falling back to its slug.
    pub async fn find_entity(
        &self,
        kind: TaxonomyKind,
        key: &str,
    ) -> Result<Option<Entity>, AppError> {
        let mut conn = self.pool.acquire().await?;
        match fetch_entity(&mut conn, kind, "id", key).await? {
            Some(entity) => Ok(Some(entity)),
            None => fetch_entity(&mut conn, kind, "slug", key).await,
        }
    }

    /// Get an entity by slug.
    pub async fn get_entity_by_slug(
        &self,
        kind: TaxonomyKind,
        slug: &str,
    ) -> Result<Option<Entity>, AppError> {
        let mut conn = self.pool.acquire().await?;
        fetch_entity(&mut conn, kind, "slug", slug).await
    }

    /// Create an entity together with its content entries.
    pub async fn create_entity(
        &self,
        kind: TaxonomyKind,
        request: &CreateEntityRequest,
    ) -> Result<Entity, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let mut tx = self.begin_write().await?;

        let draft = Draft {
            name: request.name.trim().to_string(),
            slug: request
                .slug
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            parent_id: request.parent_id.clone().filter(|p| !p.is_empty()),
            persona_ids: request.persona_ids.clone(),
        };
        let (slug, entries) =
            validate_draft(&mut tx, kind, &id, &draft, &request.elements).await?;

        let now = Utc::now().to_rfc3339();
        let parent_id = service_only(kind, draft.parent_id.clone());

        sqlx::query(
            r#"INSERT INTO entities (
                id, kind, slug, name, title, description, parent_id, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(kind.as_str())
        .bind(&slug)
        .bind(&draft.name)
        .bind(&request.title)
        .bind(&request.description)
        .bind(&parent_id)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(slug_conflict)?;

        let persona_ids = if kind == TaxonomyKind::Service {
            let ids = draft.persona_ids.clone().unwrap_or_default();
            set_personas(&mut tx, &id, &ids).await?;
            Some(ids)
        } else {
            None
        };

        replace_entries(&mut tx, kind, &id, &entries).await?;
        tx.commit().await?;

        tracing::info!(kind = kind.as_str(), id = %id, entries = entries.len(), "Entity created");

        Ok(Entity {
            id,
            kind,
            slug,
            name: draft.name,
            title: request.title.clone(),
            description: request.description.clone(),
            parent_id,
            persona_ids,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Update an entity and replace its whole set of content entries.
    pub async fn update_entity(
        &self,
        kind: TaxonomyKind,
        id: &str,
        request: &UpdateEntityRequest,
    ) -> Result<Entity, AppError> {
        let mut tx = self.begin_write().await?;

        let existing = fetch_entity(&mut tx, kind, "id", id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {} not found", kind.label(), id)))?;

        let draft = Draft {
            name: request
                .name
                .as_deref()
                .map(str::trim)
                .unwrap_or(&existing.name)
                .to_string(),
            slug: Some(
                request
                    .slug
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .unwrap_or(&existing.slug)
                    .to_string(),
            ),
            parent_id: match &request.parent_id {
                Some(parent) => parent.clone().filter(|p| !p.is_empty()),
                None => existing.parent_id.clone(),
            },
            persona_ids: request.persona_ids.clone(),
        };
        let (slug, entries) = validate_draft(&mut tx, kind, id, &draft, &request.elements).await?;

        let now = Utc::now().to_rfc3339();
        let title = request.title.clone().or(existing.title.clone());
        let description = request.description.clone().or(existing.description.clone());
        let parent_id = service_only(kind, draft.parent_id.clone());

        sqlx::query(
            r#"UPDATE entities SET
                slug = ?, name = ?, title = ?, description = ?, parent_id = ?, updated_at = ?
            WHERE id = ? AND kind = ?"#,
        )
        .bind(&slug)
        .bind(&draft.name)
        .bind(&title)
        .bind(&description)
        .bind(&parent_id)
        .bind(&now)
        .bind(id)
        .bind(kind.as_str())
        .execute(&mut *tx)
        .await
        .map_err(slug_conflict)?;

        let persona_ids = if kind == TaxonomyKind::Service {
            match &draft.persona_ids {
                Some(ids) => {
                    set_personas(&mut tx, id, ids).await?;
                    Some(ids.clone())
                }
                None => Some(persona_ids_for(&mut tx, id).await?),
            }
        } else {
            None
        };

        replace_entries(&mut tx, kind, id, &entries).await?;
        tx.commit().await?;

        tracing::info!(kind = kind.as_str(), id = %id, entries = entries.len(), "Entity updated");

        Ok(Entity {
            id: id.to_string(),
            kind,
            slug,
            name: draft.name,
            title,
            description,
            parent_id,
            persona_ids,
            created_at: existing.created_at,
            updated_at: now,
        })
    }

    /// Delete an entity, its entries and its links.
    pub async fn delete_entity(&self, kind: TaxonomyKind, id: &str) -> Result<(), AppError> {
        let mut tx = self.begin_write().await?;

        delete_entries(&mut tx, kind, id).await?;

        sqlx::query("DELETE FROM service_personas WHERE service_id = ? OR persona_id = ?")
            .bind(id)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if kind == TaxonomyKind::Service {
            sqlx::query("UPDATE entities SET parent_id = NULL WHERE parent_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        let result = sqlx::query("DELETE FROM entities WHERE id = ? AND kind = ?")
            .bind(id)
            .bind(kind.as_str())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("{} {} not found", kind.label(), id)));
        }

        tx.commit().await?;
        tracing::info!(kind = kind.as_str(), id = %id, "Entity deleted");
        Ok(())
    }

    // ==================== CONTENT ENTRY OPERATIONS ====================

    /// List a parent's entries in stored order, joined with their templates.
    pub async fn list_entries(
        &self,
        kind: TaxonomyKind,
        parent_id: &str,
    ) -> Result<Vec<StoredEntry>, AppError> {
        let rows = sqlx::query(
            r#"SELECT e.id, e.component_id, e.data,
                      t.name AS template_name, t.description AS template_description,
                      t.type AS template_type
               FROM content_entries e
               LEFT JOIN component_templates t ON t.id = e.component_id
               WHERE e.parent_kind = ? AND e.parent_id = ?
               ORDER BY e.rowid"#,
        )
        .bind(kind.as_str())
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(stored_entry_from_row).collect())
    }
}

/// Fields of an entity being saved, after merging with the stored row.
struct Draft {
    name: String,
    slug: Option<String>,
    parent_id: Option<String>,
    persona_ids: Option<Vec<String>>,
}

/// Check a draft against the stored state and resolve its builder elements.
///
/// Returns the final slug and the prepared entries; any failure is reported
/// as field errors before anything is written.
async fn validate_draft(
    conn: &mut SqliteConnection,
    kind: TaxonomyKind,
    id: &str,
    draft: &Draft,
    elements: &[crate::models::BuilderElement],
) -> Result<(String, Vec<PreparedEntry>), AppError> {
    let mut errors = FieldErrors::new();

    if draft.name.is_empty() {
        errors.insert("name".to_string(), "Name is required".to_string());
    }

    let slug = match &draft.slug {
        Some(given) => given.clone(),
        None => slug::slugify(&draft.name),
    };
    if !slug::is_valid(&slug) {
        if draft.slug.is_none() && !draft.name.is_empty() {
            errors.insert(
                "slug".to_string(),
                "Name has no ASCII letters or digits to build a slug from; provide a slug"
                    .to_string(),
            );
        } else if draft.slug.is_some() {
            errors.insert(
                "slug".to_string(),
                "Slug may only contain lowercase letters, digits and single dashes".to_string(),
            );
        }
    } else {
        let taken = sqlx::query("SELECT id FROM entities WHERE kind = ? AND slug = ? AND id <> ?")
            .bind(kind.as_str())
            .bind(&slug)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        if taken.is_some() {
            errors.insert("slug".to_string(), "Slug is already taken".to_string());
        }
    }

    if kind == TaxonomyKind::Service {
        if let Some(parent_id) = &draft.parent_id {
            if let Some(message) = check_parent(conn, id, parent_id).await? {
                errors.insert("parentId".to_string(), message);
            }
        }
        if let Some(persona_ids) = &draft.persona_ids {
            let missing = missing_personas(conn, persona_ids).await?;
            if !missing.is_empty() {
                errors.insert(
                    "personaIds".to_string(),
                    format!("Unknown persona(s): {}", missing.join(", ")),
                );
            }
        }
    } else {
        if draft.parent_id.is_some() {
            errors.insert(
                "parentId".to_string(),
                "Only services can have a parent".to_string(),
            );
        }
        if draft.persona_ids.as_ref().is_some_and(|ids| !ids.is_empty()) {
            errors.insert(
                "personaIds".to_string(),
                "Only services can be linked to personas".to_string(),
            );
        }
    }

    let catalog = Catalog::new(load_templates(conn).await?);
    let entries = match catalog.prepare(elements) {
        Ok(entries) => entries,
        Err(AppError::Fields(element_errors)) => {
            errors.extend(element_errors);
            Vec::new()
        }
        Err(e) => return Err(e),
    };

    if !errors.is_empty() {
        tracing::debug!(kind = kind.as_str(), id = %id, ?errors, "Entity failed validation");
        return Err(AppError::Fields(errors));
    }

    Ok((slug, entries))
}

/// Validate a new parent for a service. Returns a message when rejected.
async fn check_parent(
    conn: &mut SqliteConnection,
    id: &str,
    parent_id: &str,
) -> Result<Option<String>, AppError> {
    if parent_id == id {
        return Ok(Some("A service cannot be its own parent".to_string()));
    }

    let rows = sqlx::query("SELECT id, parent_id FROM entities WHERE kind = ?")
        .bind(TaxonomyKind::Service.as_str())
        .fetch_all(&mut *conn)
        .await?;
    let parents: HashMap<String, Option<String>> = rows
        .iter()
        .map(|row| (row.get("id"), row.get("parent_id")))
        .collect();

    if !parents.contains_key(parent_id) {
        return Ok(Some(format!("Parent service {} not found", parent_id)));
    }

    let cycle = hierarchy::creates_cycle(id, parent_id, |node| {
        parents.get(node).cloned().flatten()
    });
    if cycle {
        return Ok(Some(
            "Parent would make the service its own ancestor".to_string(),
        ));
    }

    Ok(None)
}

async fn missing_personas(
    conn: &mut SqliteConnection,
    persona_ids: &[String],
) -> Result<Vec<String>, AppError> {
    let mut missing = Vec::new();
    for persona_id in persona_ids {
        let found = sqlx::query("SELECT id FROM entities WHERE id = ? AND kind = ?")
            .bind(persona_id)
            .bind(TaxonomyKind::Persona.as_str())
            .fetch_optional(&mut *conn)
            .await?;
        if found.is_none() {
            missing.push(persona_id.clone());
        }
    }
    Ok(missing)
}

async fn load_templates(conn: &mut SqliteConnection) -> Result<Vec<ComponentTemplate>, AppError> {
    let rows = sqlx::query(
        "SELECT id, name, description, type FROM component_templates ORDER BY name",
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .iter()
        .map(|row| ComponentTemplate {
            id: row.get("id"),
            name: row.get("name"),
            description: row.get("description"),
            kind: ComponentKind::parse(row.get::<String, _>("type").as_str()),
        })
        .collect())
}

async fn fetch_entity(
    conn: &mut SqliteConnection,
    kind: TaxonomyKind,
    column: &str,
    value: &str,
) -> Result<Option<Entity>, AppError> {
    let sql = match column {
        "slug" => format!("SELECT {} FROM entities WHERE kind = ? AND slug = ?", ENTITY_COLUMNS),
        _ => format!("SELECT {} FROM entities WHERE kind = ? AND id = ?", ENTITY_COLUMNS),
    };
    let row = sqlx::query(&sql)
        .bind(kind.as_str())
        .bind(value)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => {
            let mut entity = entity_from_row(&row)?;
            attach_personas(conn, &mut entity).await?;
            Ok(Some(entity))
        }
        None => Ok(None),
    }
}

async fn attach_personas(conn: &mut SqliteConnection, entity: &mut Entity) -> Result<(), AppError> {
    if entity.kind == TaxonomyKind::Service {
        entity.persona_ids = Some(persona_ids_for(conn, &entity.id).await?);
    }
    Ok(())
}

async fn persona_ids_for(
    conn: &mut SqliteConnection,
    service_id: &str,
) -> Result<Vec<String>, AppError> {
    let rows = sqlx::query(
        "SELECT persona_id FROM service_personas WHERE service_id = ? ORDER BY rowid",
    )
    .bind(service_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.iter().map(|row| row.get("persona_id")).collect())
}

async fn set_personas(
    conn: &mut SqliteConnection,
    service_id: &str,
    persona_ids: &[String],
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM service_personas WHERE service_id = ?")
        .bind(service_id)
        .execute(&mut *conn)
        .await?;
    for persona_id in persona_ids {
        sqlx::query("INSERT OR IGNORE INTO service_personas (service_id, persona_id) VALUES (?, ?)")
            .bind(service_id)
            .bind(persona_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Delete every entry of a parent, then insert `entries` in order.
///
/// No matching of old rows by id: the incoming order becomes the stored order.
async fn replace_entries(
    conn: &mut SqliteConnection,
    kind: TaxonomyKind,
    parent_id: &str,
    entries: &[PreparedEntry],
) -> Result<(), AppError> {
    let removed = delete_entries(conn, kind, parent_id).await?;
    for entry in entries {
        insert_entry(conn, kind, parent_id, &entry.component_id, &codec::encode(&entry.content))
            .await?;
    }
    tracing::debug!(
        kind = kind.as_str(),
        parent_id = %parent_id,
        removed,
        inserted = entries.len(),
        "Content entries replaced"
    );
    Ok(())
}

async fn insert_entry(
    conn: &mut SqliteConnection,
    kind: TaxonomyKind,
    parent_id: &str,
    component_id: &str,
    data: &str,
) -> Result<String, AppError> {
    let id = uuid::Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO content_entries (id, parent_kind, parent_id, component_id, data) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(kind.as_str())
    .bind(parent_id)
    .bind(component_id)
    .bind(data)
    .execute(&mut *conn)
    .await?;
    Ok(id)
}

async fn delete_entries(
    conn: &mut SqliteConnection,
    kind: TaxonomyKind,
    parent_id: &str,
) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM content_entries WHERE parent_kind = ? AND parent_id = ?")
        .bind(kind.as_str())
        .bind(parent_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// Parent and persona links only exist on services.
fn service_only(kind: TaxonomyKind, parent_id: Option<String>) -> Option<String> {
    match kind {
        TaxonomyKind::Service => parent_id,
        _ => None,
    }
}

/// Map a lost race on the `(kind, slug)` unique index to a field error.
fn slug_conflict(err: sqlx::Error) -> AppError {
    let unique = err
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation());
    if unique {
        AppError::field("slug", "Slug is already taken")
    } else {
        AppError::from(err)
    }
}

// Helper functions for row conversion

fn entity_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Entity, AppError> {
    let kind: String = row.get("kind");
    let kind = TaxonomyKind::from_str(&kind)
        .ok_or_else(|| AppError::Internal(format!("Unknown entity kind {}", kind)))?;
    Ok(Entity {
        id: row.get("id"),
        kind,
        slug: row.get("slug"),
        name: row.get("name"),
        title: row.get("title"),
        description: row.get("description"),
        parent_id: row.get("parent_id"),
        persona_ids: None,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn stored_entry_from_row(row: &sqlx::sqlite::SqliteRow) -> StoredEntry {
    let component_id: String = row.get("component_id");
    let template_name: Option<String> = row.get("template_name");
    let template = template_name.map(|name| ComponentTemplate {
        id: component_id.clone(),
        name,
        description: row
            .get::<Option<String>, _>("template_description")
            .unwrap_or_default(),
        kind: ComponentKind::parse(
            row.get::<Option<String>, _>("template_type")
                .unwrap_or_default()
                .as_str(),
        ),
    });

    StoredEntry {
        id: row.get("id"),
        component_id,
        data: row.get("data"),
        template,
    }
}
