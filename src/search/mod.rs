//! Tantivy-based search index module.
//!
//! Full-text search over taxonomy entities. The body field holds the plain
//! text of every renderable content entry, so search sees what visitors see.

use std::path::Path;
use std::sync::Arc;
use tantivy::collector::{Count, TopDocs};
use tantivy::query::{BooleanQuery, BoostQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tokio::sync::RwLock;

use crate::content::render;
use crate::errors::AppError;
use crate::models::{Entity, StoredEntry, TaxonomyKind};

const BOOST_NAME: f32 = 10.0;
const BOOST_TITLE: f32 = 8.0;
const BOOST_DESCRIPTION: f32 = 5.0;
const BOOST_BODY: f32 = 2.0;

/// Deepest hit a page may reach.
pub const MAX_RESULT_WINDOW: usize = 10_000;

/// Search hit with relevance score.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub entity_id: String,
    pub kind: TaxonomyKind,
    pub name: String,
    pub score: f32,
}

/// One page of hits plus the number of matches overall.
#[derive(Debug, Default)]
pub struct SearchPage {
    pub results: Vec<SearchResult>,
    pub total: usize,
}

/// Search index schema fields.
struct SearchFields {
    entity_id: Field,
    kind: Field,
    name: Field,
    title: Field,
    description: Field,
    body: Field,
}

/// Tantivy search index for entities.
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    writer: Arc<RwLock<IndexWriter>>,
    fields: SearchFields,
}

impl SearchIndex {
    /// Create or open a search index at the specified path.
    pub fn open(index_path: &Path) -> Result<Self, AppError> {
        std::fs::create_dir_all(index_path)
            .map_err(|e| AppError::Search(format!("Failed to create index directory: {}", e)))?;

        let mut schema_builder = Schema::builder();
        let entity_id = schema_builder.add_text_field("entity_id", STRING | STORED);
        let kind = schema_builder.add_text_field("kind", STRING | STORED);
        let name = schema_builder.add_text_field("name", TEXT | STORED);
        let title = schema_builder.add_text_field("title", TEXT);
        let description = schema_builder.add_text_field("description", TEXT);
        let body = schema_builder.add_text_field("body", TEXT);
        let schema = schema_builder.build();

        let fields = SearchFields {
            entity_id,
            kind,
            name,
            title,
            description,
            body,
        };

        let index = Index::open_in_dir(index_path)
            .or_else(|_| Index::create_in_dir(index_path, schema.clone()))
            .map_err(|e| AppError::Search(format!("Failed to open/create index: {}", e)))?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e| AppError::Search(format!("Failed to create reader: {}", e)))?;

        let writer = index
            .writer(50_000_000) // 50MB buffer
            .map_err(|e| AppError::Search(format!("Failed to create writer: {}", e)))?;

        Ok(Self {
            index,
            reader,
            writer: Arc::new(RwLock::new(writer)),
            fields,
        })
    }

    /// Rebuild the entire index.
    pub async fn rebuild(&self, entities: &[(Entity, Vec<StoredEntry>)]) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        writer.delete_all_documents()?;
        for (entity, entries) in entities {
            writer.add_document(self.create_document(entity, entries))?;
        }
        writer.commit()?;
        self.reader.reload()?;

        tracing::info!("Search index rebuilt with {} entities", entities.len());
        Ok(())
    }

    /// Index or re-index a single entity.
    pub async fn index_entity(
        &self,
        entity: &Entity,
        entries: &[StoredEntry],
    ) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        writer.delete_term(Term::from_field_text(self.fields.entity_id, &entity.id));
        writer.add_document(self.create_document(entity, entries))?;
        writer.commit()?;
        self.reader.reload()?;

        Ok(())
    }

    /// Remove an entity from the index.
    pub async fn remove_entity(&self, entity_id: &str) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        writer.delete_term(Term::from_field_text(self.fields.entity_id, entity_id));
        writer.commit()?;
        self.reader.reload()?;

        Ok(())
    }

    /// Search entities of the given kinds.
    ///
    /// Query syntax errors are tolerated: whatever parses is searched.
    /// `total` counts every match, not just the returned page. Hits past
    /// `MAX_RESULT_WINDOW` are never returned.
    pub fn search(
        &self,
        query_str: &str,
        kinds: &[TaxonomyKind],
        limit: usize,
        offset: usize,
    ) -> Result<SearchPage, AppError> {
        if query_str.trim().is_empty() || kinds.is_empty() || limit == 0 {
            return Ok(SearchPage::default());
        }

        let searcher = self.reader.searcher();

        let field_queries = [
            (self.fields.name, BOOST_NAME),
            (self.fields.title, BOOST_TITLE),
            (self.fields.description, BOOST_DESCRIPTION),
            (self.fields.body, BOOST_BODY),
        ];

        let mut subqueries: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for (field, boost) in field_queries {
            let field_parser = QueryParser::for_index(&self.index, vec![field]);
            let (field_query, _errors) = field_parser.parse_query_lenient(query_str);
            subqueries.push((Occur::Should, Box::new(BoostQuery::new(field_query, boost))));
        }

        let mut kind_queries: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for kind in kinds {
            let kind_term = Term::from_field_text(self.fields.kind, kind.as_str());
            kind_queries.push((
                Occur::Should,
                Box::new(TermQuery::new(kind_term, IndexRecordOption::Basic)),
            ));
        }

        let text_query: Box<dyn Query> = Box::new(BooleanQuery::new(subqueries));
        let kind_query: Box<dyn Query> = Box::new(BooleanQuery::new(kind_queries));
        let query = BooleanQuery::new(vec![(Occur::Must, text_query), (Occur::Must, kind_query)]);

        let window = offset.saturating_add(limit).min(MAX_RESULT_WINDOW);
        if offset >= window {
            let total = searcher
                .search(&query, &Count)
                .map_err(|e| AppError::Search(format!("Search failed: {}", e)))?;
            return Ok(SearchPage {
                results: Vec::new(),
                total,
            });
        }

        let (top_docs, total) = searcher
            .search(&query, &(TopDocs::with_limit(window), Count))
            .map_err(|e| AppError::Search(format!("Search failed: {}", e)))?;

        let results = top_docs
            .into_iter()
            .skip(offset)
            .filter_map(|(score, doc_address)| {
                let doc: TantivyDocument = searcher.doc(doc_address).ok()?;
                let entity_id = doc.get_first(self.fields.entity_id)?.as_str()?.to_string();
                let kind = TaxonomyKind::from_str(doc.get_first(self.fields.kind)?.as_str()?)?;
                let name = doc.get_first(self.fields.name)?.as_str()?.to_string();
                Some(SearchResult {
                    entity_id,
                    kind,
                    name,
                    score,
                })
            })
            .collect();

        Ok(SearchPage { results, total })
    }

    fn create_document(&self, entity: &Entity, entries: &[StoredEntry]) -> TantivyDocument {
        let body = render::render_entries(entries)
            .iter()
            .map(|block| block.node.plain_text())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        doc!(
            self.fields.entity_id => entity.id.clone(),
            self.fields.kind => entity.kind.as_str().to_string(),
            self.fields.name => entity.name.clone(),
            self.fields.title => entity.title.clone().unwrap_or_default(),
            self.fields.description => entity.description.clone().unwrap_or_default(),
            self.fields.body => body
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ComponentKind, ComponentTemplate};
    use tempfile::TempDir;

    fn entity(id: &str, kind: TaxonomyKind, name: &str) -> Entity {
        Entity {
            id: id.to_string(),
            kind,
            slug: id.to_string(),
            name: name.to_string(),
            title: None,
            description: None,
            parent_id: None,
            persona_ids: None,
            created_at: "2024-01-01T00:00:00Z".to_string(),
            updated_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    fn text_entry(text: &str) -> StoredEntry {
        StoredEntry {
            id: "entry".to_string(),
            component_id: "text-block".to_string(),
            data: serde_json::json!([text]).to_string(),
            template: Some(ComponentTemplate {
                id: "text-block".to_string(),
                name: "text-block".to_string(),
                description: String::new(),
                kind: ComponentKind::TextBlock,
            }),
        }
    }

    #[tokio::test]
    async fn test_search_finds_body_text() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open(temp_dir.path()).unwrap();

        index
            .rebuild(&[
                (
                    entity("p1", TaxonomyKind::Page, "Home"),
                    vec![text_entry("We file your payroll every month")],
                ),
                (entity("p2", TaxonomyKind::Page, "Contact"), Vec::new()),
            ])
            .await
            .unwrap();

        let page = index.search("payroll", &TaxonomyKind::ALL, 10, 0).unwrap();
        assert_eq!(page.total, 1);
        let results = page.results;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].entity_id, "p1");
        assert_eq!(results[0].name, "Home");
    }

    #[tokio::test]
    async fn test_kind_filter_and_reindex() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open(temp_dir.path()).unwrap();

        index
            .index_entity(&entity("s1", TaxonomyKind::Service, "Audit"), &[])
            .await
            .unwrap();
        index
            .index_entity(&entity("p1", TaxonomyKind::Page, "Audit overview"), &[])
            .await
            .unwrap();

        let services = index
            .search("audit", &[TaxonomyKind::Service], 10, 0)
            .unwrap()
            .results;
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].kind, TaxonomyKind::Service);

        // Re-indexing replaces the previous document.
        index
            .index_entity(&entity("s1", TaxonomyKind::Service, "Audit"), &[])
            .await
            .unwrap();
        assert_eq!(index.search("audit", &TaxonomyKind::ALL, 10, 0).unwrap().total, 2);

        index.remove_entity("s1").await.unwrap();
        let remaining = index.search("audit", &TaxonomyKind::ALL, 10, 0).unwrap().results;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].entity_id, "p1");
    }

    #[tokio::test]
    async fn test_search_empty_query() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open(temp_dir.path()).unwrap();

        assert!(index.search("", &TaxonomyKind::ALL, 10, 0).unwrap().results.is_empty());
        assert!(index.search("(unbalanced", &TaxonomyKind::ALL, 10, 0).is_ok());
    }

    #[tokio::test]
    async fn test_degenerate_page_bounds() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open(temp_dir.path()).unwrap();
        index
            .index_entity(&entity("s1", TaxonomyKind::Service, "Audit"), &[])
            .await
            .unwrap();

        let page = index.search("audit", &TaxonomyKind::ALL, 0, 0).unwrap();
        assert!(page.results.is_empty());

        let page = index
            .search("audit", &TaxonomyKind::ALL, 10, usize::MAX)
            .unwrap();
        assert!(page.results.is_empty());
        assert_eq!(page.total, 1);

        assert!(index.search("audit", &[], 10, 0).unwrap().results.is_empty());
    }

    #[tokio::test]
    async fn test_total_counts_all_matches_of_the_given_kinds() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open(temp_dir.path()).unwrap();
        let mut documents = Vec::new();
        for i in 0..5 {
            documents.push((entity(&format!("p{}", i), TaxonomyKind::Page, "Audit"), Vec::new()));
        }
        documents.push((entity("s1", TaxonomyKind::Service, "Audit"), Vec::new()));
        index.rebuild(&documents).await.unwrap();

        let page = index.search("audit", &[TaxonomyKind::Page], 2, 2).unwrap();
        assert_eq!(page.results.len(), 2);
        assert_eq!(page.total, 5);
        assert!(page.results.iter().all(|r| r.kind == TaxonomyKind::Page));

        let page = index
            .search("audit", &[TaxonomyKind::Page, TaxonomyKind::Service], 10, 0)
            .unwrap();
        assert_eq!(page.total, 6);
    }
}
