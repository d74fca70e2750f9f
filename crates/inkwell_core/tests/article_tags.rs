use inkwell_core::db::open_db_in_memory;
use inkwell_core::model::{ArticlePatch, ArticleStatus, NewArticle, NewTag};
use inkwell_core::{
    ArticleRepository, NoopCache, RepoError, SqliteArticleRepository, SqliteTaxonomyRepository,
    TaxonomyRepository,
};
use rusqlite::Connection;
use std::sync::Arc;

fn seed_tags(conn: &Connection, names: &[&str]) -> Vec<String> {
    let repo = SqliteTaxonomyRepository::try_new(conn).unwrap();
    names
        .iter()
        .map(|name| {
            repo.create_tag(&NewTag {
                name: name.to_string(),
                slug: name.to_string(),
            })
            .unwrap()
            .id
        })
        .collect()
}

fn tag_ids_of(conn: &mut Connection, article_id: &str) -> Vec<String> {
    let repo = SqliteArticleRepository::try_new(conn, Arc::new(NoopCache)).unwrap();
    let mut ids: Vec<String> = repo
        .get_article_any_status(article_id)
        .unwrap()
        .tags
        .into_iter()
        .map(|tag| tag.id)
        .collect();
    ids.sort();
    ids
}

fn sorted(mut ids: Vec<String>) -> Vec<String> {
    ids.sort();
    ids
}

fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[test]
fn create_with_tags_links_known_tags_and_drops_unknown_ones() {
    let mut conn = open_db_in_memory().unwrap();
    let tags = seed_tags(&conn, &["rust", "sqlite"]);

    let requested = vec![
        tags[0].clone(),
        "no-such-tag".to_string(),
        tags[1].clone(),
        tags[0].clone(),
    ];
    let created = SqliteArticleRepository::try_new(&mut conn, Arc::new(NoopCache))
        .unwrap()
        .create_article_with_tags(NewArticle::new("Tagged", "body"), &requested)
        .unwrap();

    assert_eq!(created.tags.len(), 2);
    assert_eq!(tag_ids_of(&mut conn, &created.id), sorted(tags));
}

#[test]
fn create_with_empty_tag_list_links_nothing() {
    let mut conn = open_db_in_memory().unwrap();
    seed_tags(&conn, &["rust"]);

    let created = SqliteArticleRepository::try_new(&mut conn, Arc::new(NoopCache))
        .unwrap()
        .create_article_with_tags(NewArticle::new("Bare", "body"), &[])
        .unwrap();

    assert!(created.tags.is_empty());
    assert_eq!(count_rows(&conn, "article_tags"), 0);
}

#[test]
fn absent_tag_list_leaves_links_untouched() {
    let mut conn = open_db_in_memory().unwrap();
    let tags = seed_tags(&conn, &["a", "b"]);
    let mut repo = SqliteArticleRepository::try_new(&mut conn, Arc::new(NoopCache)).unwrap();
    let id = repo
        .create_article_with_tags(NewArticle::new("Keep", "body"), &tags)
        .unwrap()
        .id;

    repo.update_article_with_tags(&id, ArticlePatch::default(), None)
        .unwrap();
    drop(repo);

    assert_eq!(tag_ids_of(&mut conn, &id), sorted(tags));
}

#[test]
fn empty_tag_list_clears_every_link() {
    let mut conn = open_db_in_memory().unwrap();
    let tags = seed_tags(&conn, &["a", "b"]);
    let mut repo = SqliteArticleRepository::try_new(&mut conn, Arc::new(NoopCache)).unwrap();
    let id = repo
        .create_article_with_tags(NewArticle::new("Clear", "body"), &tags)
        .unwrap()
        .id;

    repo.update_article_with_tags(&id, ArticlePatch::default(), Some(&[]))
        .unwrap();
    drop(repo);

    assert!(tag_ids_of(&mut conn, &id).is_empty());
    assert_eq!(count_rows(&conn, "tags"), 2);
}

#[test]
fn tag_list_replaces_the_set_instead_of_appending() {
    let mut conn = open_db_in_memory().unwrap();
    let tags = seed_tags(&conn, &["a", "b", "c"]);
    let mut repo = SqliteArticleRepository::try_new(&mut conn, Arc::new(NoopCache)).unwrap();
    let id = repo
        .create_article_with_tags(NewArticle::new("Swap", "body"), &tags[..2])
        .unwrap()
        .id;

    let patch = ArticlePatch {
        title: Some("Swapped".to_string()),
        ..ArticlePatch::default()
    };
    repo.update_article_with_tags(&id, patch, Some(&tags[1..]))
        .unwrap();
    let article = repo.get_article_any_status(&id).unwrap();
    drop(repo);

    assert_eq!(article.title, "Swapped");
    assert_eq!(tag_ids_of(&mut conn, &id), sorted(tags[1..].to_vec()));
}

#[test]
fn failed_create_leaves_no_article_and_no_links() {
    let mut conn = open_db_in_memory().unwrap();
    let tags = seed_tags(&conn, &["a"]);

    let mut article = NewArticle::new("Orphan", "body");
    article.category_id = Some("missing-category".to_string());
    let err = SqliteArticleRepository::try_new(&mut conn, Arc::new(NoopCache))
        .unwrap()
        .create_article_with_tags(article, &tags)
        .unwrap_err();

    assert!(matches!(err, RepoError::InvalidReference(_)));
    assert_eq!(count_rows(&conn, "articles"), 0);
    assert_eq!(count_rows(&conn, "article_tags"), 0);
}

#[test]
fn failed_update_rolls_back_the_tag_replacement() {
    let mut conn = open_db_in_memory().unwrap();
    let tags = seed_tags(&conn, &["a", "b"]);
    let mut repo = SqliteArticleRepository::try_new(&mut conn, Arc::new(NoopCache)).unwrap();
    let id = repo
        .create_article_with_tags(NewArticle::new("Stable", "body"), &tags[..1])
        .unwrap()
        .id;

    let patch = ArticlePatch {
        title: Some("Never applied".to_string()),
        author_id: Some("missing-user".to_string()).into(),
        ..ArticlePatch::default()
    };
    let err = repo
        .update_article_with_tags(&id, patch, Some(&tags))
        .unwrap_err();
    let article = repo.get_article_any_status(&id).unwrap();
    drop(repo);

    assert!(matches!(err, RepoError::InvalidReference(_)));
    assert_eq!(article.title, "Stable");
    assert_eq!(tag_ids_of(&mut conn, &id), vec![tags[0].clone()]);
}

#[test]
fn update_of_missing_article_writes_no_links() {
    let mut conn = open_db_in_memory().unwrap();
    let tags = seed_tags(&conn, &["a"]);

    let err = SqliteArticleRepository::try_new(&mut conn, Arc::new(NoopCache))
        .unwrap()
        .update_article_with_tags("missing", ArticlePatch::default(), Some(&tags))
        .unwrap_err();

    assert!(matches!(err, RepoError::NotFound { entity: "article", .. }));
    assert_eq!(count_rows(&conn, "article_tags"), 0);
}

#[test]
fn deleting_a_tag_detaches_it_from_articles() {
    let mut conn = open_db_in_memory().unwrap();
    let tags = seed_tags(&conn, &["a", "b"]);
    let id = SqliteArticleRepository::try_new(&mut conn, Arc::new(NoopCache))
        .unwrap()
        .create_article_with_tags(NewArticle::new("Detach", "body"), &tags)
        .unwrap()
        .id;

    SqliteTaxonomyRepository::try_new(&conn)
        .unwrap()
        .delete_tag(&tags[0])
        .unwrap();

    assert_eq!(tag_ids_of(&mut conn, &id), vec![tags[1].clone()]);
}

#[test]
fn published_at_is_stamped_once() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteArticleRepository::try_new(&mut conn, Arc::new(NoopCache)).unwrap();
    let id = repo
        .create_article(NewArticle::new("Lifecycle", "body"))
        .unwrap()
        .id;
    assert_eq!(repo.get_article_any_status(&id).unwrap().published_at, None);

    repo.update_article(&id, ArticlePatch::status(ArticleStatus::Pending))
        .unwrap();
    assert_eq!(repo.get_article_any_status(&id).unwrap().published_at, None);

    repo.update_article(&id, ArticlePatch::status(ArticleStatus::Published))
        .unwrap();
    let first = repo.get_article_any_status(&id).unwrap().published_at;
    assert!(first.is_some());
    drop(repo);

    conn.execute(
        "UPDATE articles SET published_at = 42 WHERE id = ?1;",
        [id.as_str()],
    )
    .unwrap();
    let repo = SqliteArticleRepository::try_new(&mut conn, Arc::new(NoopCache)).unwrap();
    repo.update_article(&id, ArticlePatch::status(ArticleStatus::Rejected))
        .unwrap();
    repo.update_article(&id, ArticlePatch::status(ArticleStatus::Published))
        .unwrap();
    assert_eq!(repo.get_article_any_status(&id).unwrap().published_at, Some(42));
}

#[test]
fn empty_string_references_are_stored_as_null() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteArticleRepository::try_new(&mut conn, Arc::new(NoopCache)).unwrap();

    let mut article = NewArticle::new("No refs", "body");
    article.category_id = Some(String::new());
    article.author_id = Some(String::new());
    let created = repo.create_article(article).unwrap();
    assert_eq!(created.category_id, None);
    assert_eq!(created.author_id, None);

    let patch = ArticlePatch {
        category_id: Some(String::new()).into(),
        ..ArticlePatch::default()
    };
    repo.update_article(&created.id, patch).unwrap();
    assert_eq!(
        repo.get_article_any_status(&created.id).unwrap().category_id,
        None
    );
}
