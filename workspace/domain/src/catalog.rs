//! Categories, genres and titles.
//!
//! Reads are public. Every write is restricted to admins and superusers and
//! the policy is evaluated before any lookup or mutation. Titles are always
//! returned with their category, genres and computed rating attached.

use std::collections::{BTreeSet, HashMap};

use chrono::{Datelike, Utc};
use model::entities::{category, comment, genre, review, title, title_genre};
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, NotSet,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::{debug, info, instrument, warn};

use crate::error::{DomainError, Result};
use crate::pagination::{Page, PageRequest, contains_ignore_case, fetch_page};
use crate::policy::{Access, Principal, Rule};
use crate::rating::title_ratings;
use crate::validation::{MAX_NAME_LEN, validate_length, validate_slug, validate_year};

/// Payload shared by categories and genres.
#[derive(Debug, Clone)]
pub struct NewTaxon {
    pub name: String,
    pub slug: String,
}

impl NewTaxon {
    fn validate(&self) -> Result<()> {
        validate_length("name", &self.name, MAX_NAME_LEN)?;
        validate_slug(&self.slug)
    }
}

fn write_access(caller: Option<&Principal>) -> Result<()> {
    Rule::AdminOrReadOnly.check(caller, Access::Write, None)
}

// Categories

#[instrument(skip(db))]
pub async fn list_categories(
    db: &DatabaseConnection,
    search: Option<&str>,
    page: PageRequest,
) -> Result<Page<category::Model>> {
    let mut query = category::Entity::find().order_by_asc(category::Column::Name);
    if let Some(term) = search.filter(|t| !t.is_empty()) {
        query = query.filter(contains_ignore_case(category::Column::Name, term));
    }
    fetch_page(db, query, page).await
}

#[instrument(skip(db, caller))]
pub async fn create_category(
    db: &DatabaseConnection,
    caller: Option<&Principal>,
    input: NewTaxon,
) -> Result<category::Model> {
    write_access(caller)?;
    input.validate()?;

    if category::Entity::find()
        .filter(category::Column::Slug.eq(&input.slug))
        .one(db)
        .await?
        .is_some()
    {
        warn!("Category slug '{}' already exists", input.slug);
        return Err(slug_taken("category", &input.slug));
    }

    let slug = input.slug.clone();
    let created = category::ActiveModel {
        id: NotSet,
        name: Set(input.name),
        slug: Set(input.slug),
    }
    .insert(db)
    .await
    .map_err(|err| DomainError::from_write(err, || slug_taken("category", &slug).to_string()))?;

    info!("Created category {} ({})", created.slug, created.id);
    Ok(created)
}

/// Titles in the category keep existing with no category.
#[instrument(skip(db, caller))]
pub async fn delete_category(
    db: &DatabaseConnection,
    caller: Option<&Principal>,
    slug: &str,
) -> Result<()> {
    write_access(caller)?;
    let found = category::Entity::find()
        .filter(category::Column::Slug.eq(slug))
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("Category", slug))?;

    let txn = db.begin().await?;
    let detached = title::Entity::update_many()
        .col_expr(title::Column::CategoryId, Expr::value(Option::<i32>::None))
        .filter(title::Column::CategoryId.eq(found.id))
        .exec(&txn)
        .await?;
    category::Entity::delete_by_id(found.id).exec(&txn).await?;
    txn.commit().await?;

    info!("Deleted category {}, detached {} titles", slug, detached.rows_affected);
    Ok(())
}

// Genres

#[instrument(skip(db))]
pub async fn list_genres(
    db: &DatabaseConnection,
    search: Option<&str>,
    page: PageRequest,
) -> Result<Page<genre::Model>> {
    let mut query = genre::Entity::find().order_by_asc(genre::Column::Name);
    if let Some(term) = search.filter(|t| !t.is_empty()) {
        query = query.filter(contains_ignore_case(genre::Column::Name, term));
    }
    fetch_page(db, query, page).await
}

#[instrument(skip(db, caller))]
pub async fn create_genre(
    db: &DatabaseConnection,
    caller: Option<&Principal>,
    input: NewTaxon,
) -> Result<genre::Model> {
    write_access(caller)?;
    input.validate()?;

    if genre::Entity::find()
        .filter(genre::Column::Slug.eq(&input.slug))
        .one(db)
        .await?
        .is_some()
    {
        warn!("Genre slug '{}' already exists", input.slug);
        return Err(slug_taken("genre", &input.slug));
    }

    let slug = input.slug.clone();
    let created = genre::ActiveModel {
        id: NotSet,
        name: Set(input.name),
        slug: Set(input.slug),
    }
    .insert(db)
    .await
    .map_err(|err| DomainError::from_write(err, || slug_taken("genre", &slug).to_string()))?;

    info!("Created genre {} ({})", created.slug, created.id);
    Ok(created)
}

/// Removes the genre and its title links; the titles themselves stay.
#[instrument(skip(db, caller))]
pub async fn delete_genre(
    db: &DatabaseConnection,
    caller: Option<&Principal>,
    slug: &str,
) -> Result<()> {
    write_access(caller)?;
    let found = genre::Entity::find()
        .filter(genre::Column::Slug.eq(slug))
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("Genre", slug))?;

    let txn = db.begin().await?;
    title_genre::Entity::delete_many()
        .filter(title_genre::Column::GenreId.eq(found.id))
        .exec(&txn)
        .await?;
    genre::Entity::delete_by_id(found.id).exec(&txn).await?;
    txn.commit().await?;

    info!("Deleted genre {}", slug);
    Ok(())
}

fn slug_taken(kind: &str, slug: &str) -> DomainError {
    DomainError::Conflict(format!("A {kind} with slug '{slug}' already exists"))
}

// Titles

#[derive(Debug, Clone, Default)]
pub struct TitleFilter {
    /// Category slug.
    pub category: Option<String>,
    /// Genre slug.
    pub genre: Option<String>,
    /// Case-insensitive substring of the name.
    pub name: Option<String>,
    pub year: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct NewTitle {
    pub name: String,
    pub year: i32,
    pub description: Option<String>,
    /// Genre slugs.
    pub genres: Vec<String>,
    /// Category slug.
    pub category: Option<String>,
}

/// Partial title update. For the nested options the outer `None` means
/// "leave unchanged" and `Some(None)` clears the value. `genres` replaces the
/// whole set when present.
#[derive(Debug, Clone, Default)]
pub struct TitleChanges {
    pub name: Option<String>,
    pub year: Option<i32>,
    pub description: Option<Option<String>>,
    pub genres: Option<Vec<String>>,
    pub category: Option<Option<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TitleDetails {
    pub title: title::Model,
    pub category: Option<category::Model>,
    pub genres: Vec<genre::Model>,
    pub rating: Option<f64>,
}

#[instrument(skip(db))]
pub async fn list_titles(
    db: &DatabaseConnection,
    filter: TitleFilter,
    page: PageRequest,
) -> Result<Page<TitleDetails>> {
    let mut query = title::Entity::find().order_by_asc(title::Column::Id);

    if let Some(slug) = filter.category.as_deref() {
        match category::Entity::find()
            .filter(category::Column::Slug.eq(slug))
            .one(db)
            .await?
        {
            Some(found) => query = query.filter(title::Column::CategoryId.eq(found.id)),
            None => {
                debug!("Unknown category '{}' in title filter", slug);
                return Ok(empty_page(page));
            }
        }
    }

    if let Some(slug) = filter.genre.as_deref() {
        match genre::Entity::find()
            .filter(genre::Column::Slug.eq(slug))
            .one(db)
            .await?
        {
            Some(found) => {
                query = query.filter(
                    title::Column::Id.in_subquery(
                        Query::select()
                            .column(title_genre::Column::TitleId)
                            .from(title_genre::Entity)
                            .and_where(title_genre::Column::GenreId.eq(found.id))
                            .to_owned(),
                    ),
                );
            }
            None => {
                debug!("Unknown genre '{}' in title filter", slug);
                return Ok(empty_page(page));
            }
        }
    }

    if let Some(name) = filter.name.as_deref().filter(|n| !n.is_empty()) {
        query = query.filter(contains_ignore_case(title::Column::Name, name));
    }
    if let Some(year) = filter.year {
        query = query.filter(title::Column::Year.eq(year));
    }

    let page = fetch_page(db, query, page).await?;
    let titles = page.items.clone();
    let details = load_details(db, titles).await?;
    Ok(page.with_items(details))
}

fn empty_page<T>(page: PageRequest) -> Page<T> {
    Page {
        items: Vec::new(),
        total: 0,
        page: page.page,
        limit: page.limit,
    }
}

#[instrument(skip(db))]
pub async fn get_title(db: &DatabaseConnection, title_id: i32) -> Result<TitleDetails> {
    let found = find_title(db, title_id).await?;
    single_details(db, found).await
}

pub(crate) async fn find_title<C: ConnectionTrait>(db: &C, title_id: i32) -> Result<title::Model> {
    title::Entity::find_by_id(title_id)
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("Title", title_id))
}

#[instrument(skip(db, caller))]
pub async fn create_title(
    db: &DatabaseConnection,
    caller: Option<&Principal>,
    input: NewTitle,
) -> Result<TitleDetails> {
    write_access(caller)?;
    validate_length("name", &input.name, MAX_NAME_LEN)?;
    validate_year(input.year, Utc::now().year())?;

    let txn = db.begin().await?;
    let category_id = match input.category.as_deref() {
        Some(slug) => Some(resolve_category(&txn, slug).await?.id),
        None => None,
    };
    let genres = resolve_genres(&txn, &input.genres).await?;

    let created = title::ActiveModel {
        id: NotSet,
        name: Set(input.name),
        year: Set(input.year),
        description: Set(input.description),
        category_id: Set(category_id),
    }
    .insert(&txn)
    .await?;
    link_genres(&txn, created.id, &genres).await?;
    txn.commit().await?;

    info!("Created title {} ({}) with {} genres", created.name, created.id, genres.len());
    single_details(db, created).await
}

#[instrument(skip(db, caller))]
pub async fn update_title(
    db: &DatabaseConnection,
    caller: Option<&Principal>,
    title_id: i32,
    changes: TitleChanges,
) -> Result<TitleDetails> {
    write_access(caller)?;
    let existing = find_title(db, title_id).await?;

    if let Some(name) = &changes.name {
        validate_length("name", name, MAX_NAME_LEN)?;
    }
    if let Some(year) = changes.year {
        validate_year(year, Utc::now().year())?;
    }

    let txn = db.begin().await?;
    let mut active: title::ActiveModel = existing.clone().into();
    if let Some(name) = changes.name {
        active.name = Set(name);
    }
    if let Some(year) = changes.year {
        active.year = Set(year);
    }
    if let Some(description) = changes.description {
        active.description = Set(description);
    }
    if let Some(category) = changes.category {
        let category_id = match category.as_deref() {
            Some(slug) => Some(resolve_category(&txn, slug).await?.id),
            None => None,
        };
        active.category_id = Set(category_id);
    }
    let updated = if active.is_changed() {
        active.update(&txn).await?
    } else {
        existing
    };

    if let Some(slugs) = changes.genres {
        let genres = resolve_genres(&txn, &slugs).await?;
        title_genre::Entity::delete_many()
            .filter(title_genre::Column::TitleId.eq(title_id))
            .exec(&txn)
            .await?;
        link_genres(&txn, title_id, &genres).await?;
    }
    txn.commit().await?;

    info!("Updated title {}", title_id);
    single_details(db, updated).await
}

/// Deletes the title together with its reviews, their comments and its genre
/// links.
#[instrument(skip(db, caller))]
pub async fn delete_title(
    db: &DatabaseConnection,
    caller: Option<&Principal>,
    title_id: i32,
) -> Result<()> {
    write_access(caller)?;
    find_title(db, title_id).await?;

    let txn = db.begin().await?;
    comment::Entity::delete_many()
        .filter(
            comment::Column::ReviewId.in_subquery(
                Query::select()
                    .column(review::Column::Id)
                    .from(review::Entity)
                    .and_where(review::Column::TitleId.eq(title_id))
                    .to_owned(),
            ),
        )
        .exec(&txn)
        .await?;
    let reviews = review::Entity::delete_many()
        .filter(review::Column::TitleId.eq(title_id))
        .exec(&txn)
        .await?;
    title_genre::Entity::delete_many()
        .filter(title_genre::Column::TitleId.eq(title_id))
        .exec(&txn)
        .await?;
    title::Entity::delete_by_id(title_id).exec(&txn).await?;
    txn.commit().await?;

    info!("Deleted title {} and {} reviews", title_id, reviews.rows_affected);
    Ok(())
}

async fn resolve_category<C: ConnectionTrait>(db: &C, slug: &str) -> Result<category::Model> {
    category::Entity::find()
        .filter(category::Column::Slug.eq(slug))
        .one(db)
        .await?
        .ok_or_else(|| {
            DomainError::validation("category", format!("Unknown category slug '{slug}'"))
        })
}

/// Resolves slugs to genres, dropping duplicates. Any unknown slug fails the
/// whole request.
async fn resolve_genres<C: ConnectionTrait>(db: &C, slugs: &[String]) -> Result<Vec<genre::Model>> {
    let wanted: BTreeSet<&str> = slugs.iter().map(String::as_str).collect();
    if wanted.is_empty() {
        return Ok(Vec::new());
    }

    let found = genre::Entity::find()
        .filter(genre::Column::Slug.is_in(wanted.iter().copied()))
        .all(db)
        .await?;
    if found.len() != wanted.len() {
        let known: BTreeSet<&str> = found.iter().map(|g| g.slug.as_str()).collect();
        let missing: Vec<&str> = wanted.difference(&known).copied().collect();
        return Err(DomainError::validation(
            "genre",
            format!("Unknown genre slugs: {}", missing.join(", ")),
        ));
    }
    Ok(found)
}

async fn link_genres<C: ConnectionTrait>(db: &C, title_id: i32, genres: &[genre::Model]) -> Result<()> {
    if genres.is_empty() {
        return Ok(());
    }
    let links = genres.iter().map(|g| title_genre::ActiveModel {
        title_id: Set(title_id),
        genre_id: Set(g.id),
    });
    title_genre::Entity::insert_many(links)
        .exec_without_returning(db)
        .await?;
    Ok(())
}

async fn single_details(db: &DatabaseConnection, found: title::Model) -> Result<TitleDetails> {
    load_details(db, vec![found])
        .await?
        .pop()
        .ok_or_else(|| DomainError::NotFound("Title not found".to_string()))
}

/// Attaches category, genres and rating to each title, keeping input order.
async fn load_details<C: ConnectionTrait>(db: &C, titles: Vec<title::Model>) -> Result<Vec<TitleDetails>> {
    if titles.is_empty() {
        return Ok(Vec::new());
    }
    let title_ids: Vec<i32> = titles.iter().map(|t| t.id).collect();

    let category_ids: BTreeSet<i32> = titles.iter().filter_map(|t| t.category_id).collect();
    let categories: HashMap<i32, category::Model> = if category_ids.is_empty() {
        HashMap::new()
    } else {
        category::Entity::find()
            .filter(category::Column::Id.is_in(category_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect()
    };

    let links = title_genre::Entity::find()
        .filter(title_genre::Column::TitleId.is_in(title_ids.iter().copied()))
        .all(db)
        .await?;
    let genre_ids: BTreeSet<i32> = links.iter().map(|l| l.genre_id).collect();
    let genres: HashMap<i32, genre::Model> = if genre_ids.is_empty() {
        HashMap::new()
    } else {
        genre::Entity::find()
            .filter(genre::Column::Id.is_in(genre_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|g| (g.id, g))
            .collect()
    };
    let mut genres_by_title: HashMap<i32, Vec<genre::Model>> = HashMap::new();
    for link in links {
        if let Some(g) = genres.get(&link.genre_id) {
            genres_by_title.entry(link.title_id).or_default().push(g.clone());
        }
    }

    let ratings = title_ratings(db, &title_ids).await?;

    Ok(titles
        .into_iter()
        .map(|t| {
            let mut genres = genres_by_title.remove(&t.id).unwrap_or_default();
            genres.sort_by(|a, b| a.name.cmp(&b.name));
            TitleDetails {
                category: t.category_id.and_then(|id| categories.get(&id).cloned()),
                rating: ratings.get(&t.id).copied(),
                genres,
                title: t,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        create_category_row, create_genre_row, create_review_row, create_title_row,
        create_user_row, principal, setup_test_db,
    };
    use model::Role;

    fn taxon(name: &str, slug: &str) -> NewTaxon {
        NewTaxon { name: name.to_string(), slug: slug.to_string() }
    }

    fn new_title(name: &str, genres: &[&str], category: Option<&str>) -> NewTitle {
        NewTitle {
            name: name.to_string(),
            year: 1999,
            description: Some("A work".to_string()),
            genres: genres.iter().map(|s| s.to_string()).collect(),
            category: category.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_only_admins_write_catalog() {
        let db = setup_test_db().await;
        let user = principal(&create_user_row(&db, "user", Role::User).await);
        let moderator = principal(&create_user_row(&db, "moder", Role::Moderator).await);
        let admin = principal(&create_user_row(&db, "admin", Role::Admin).await);

        assert!(matches!(
            create_category(&db, None, taxon("Films", "films")).await,
            Err(DomainError::Unauthenticated)
        ));
        for caller in [&user, &moderator] {
            assert!(matches!(
                create_genre(&db, Some(caller), taxon("Drama", "drama")).await,
                Err(DomainError::PermissionDenied(_))
            ));
        }
        assert!(create_genre(&db, Some(&admin), taxon("Drama", "drama")).await.is_ok());
        // Denial comes before the lookup, so a missing slug still yields 403.
        assert!(matches!(
            delete_category(&db, Some(&user), "missing").await,
            Err(DomainError::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_slug_rules() {
        let db = setup_test_db().await;
        let admin = principal(&create_user_row(&db, "admin", Role::Admin).await);

        create_category(&db, Some(&admin), taxon("Films", "films")).await.unwrap();
        assert!(matches!(
            create_category(&db, Some(&admin), taxon("Movies", "films")).await,
            Err(DomainError::Conflict(_))
        ));
        assert!(matches!(
            create_category(&db, Some(&admin), taxon("Books", "bad slug!")).await,
            Err(DomainError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_search_categories_case_insensitive() {
        let db = setup_test_db().await;
        create_category_row(&db, "Films", "films").await;
        create_category_row(&db, "Books", "books").await;

        let page = list_categories(&db, Some("FIL"), PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].slug, "films");
    }

    #[tokio::test]
    async fn test_create_title_resolves_slugs() {
        let db = setup_test_db().await;
        let admin = principal(&create_user_row(&db, "admin", Role::Admin).await);
        create_category_row(&db, "Films", "films").await;
        create_genre_row(&db, "Drama", "drama").await;
        create_genre_row(&db, "Comedy", "comedy").await;

        let details = create_title(
            &db,
            Some(&admin),
            new_title("Dramedy", &["drama", "comedy", "drama"], Some("films")),
        )
        .await
        .unwrap();
        assert_eq!(details.category.unwrap().slug, "films");
        let slugs: Vec<_> = details.genres.iter().map(|g| g.slug.as_str()).collect();
        assert_eq!(slugs, vec!["comedy", "drama"]);
        assert_eq!(details.rating, None);

        let unknown = create_title(&db, Some(&admin), new_title("X", &["horror"], None)).await;
        assert!(matches!(unknown, Err(DomainError::Validation { ref field, .. }) if field == "genre"));

        let unknown = create_title(&db, Some(&admin), new_title("X", &[], Some("games"))).await;
        assert!(matches!(unknown, Err(DomainError::Validation { ref field, .. }) if field == "category"));
    }

    #[tokio::test]
    async fn test_future_year_is_rejected() {
        let db = setup_test_db().await;
        let admin = principal(&create_user_row(&db, "admin", Role::Admin).await);
        let mut input = new_title("Tomorrow", &[], None);
        input.year = Utc::now().year() + 1;
        assert!(matches!(
            create_title(&db, Some(&admin), input).await,
            Err(DomainError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_title_replaces_genres() {
        let db = setup_test_db().await;
        let admin = principal(&create_user_row(&db, "admin", Role::Admin).await);
        create_category_row(&db, "Films", "films").await;
        create_genre_row(&db, "Drama", "drama").await;
        create_genre_row(&db, "Comedy", "comedy").await;
        let created = create_title(&db, Some(&admin), new_title("T", &["drama"], Some("films")))
            .await
            .unwrap();

        let updated = update_title(
            &db,
            Some(&admin),
            created.title.id,
            TitleChanges {
                name: Some("Renamed".into()),
                genres: Some(vec!["comedy".into()]),
                category: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.title.name, "Renamed");
        assert_eq!(updated.title.year, 1999);
        assert_eq!(updated.category, None);
        assert_eq!(updated.genres.len(), 1);
        assert_eq!(updated.genres[0].slug, "comedy");

        assert!(matches!(
            update_title(&db, Some(&admin), 9999, TitleChanges::default()).await,
            Err(DomainError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_name_filter_treats_wildcards_literally() {
        let db = setup_test_db().await;
        create_title_row(&db, "Dune", 1965, None).await;
        create_title_row(&db, "100% Wolf", 2020, None).await;

        let search = |name: &str| TitleFilter { name: Some(name.into()), ..Default::default() };
        for term in ["%", "D_ne"] {
            let page = list_titles(&db, search(term), PageRequest::default()).await.unwrap();
            let names: Vec<String> = page.items.into_iter().map(|d| d.title.name).collect();
            let expected: Vec<String> = if term == "%" { vec!["100% Wolf".into()] } else { vec![] };
            assert_eq!(names, expected, "term {term:?}");
        }
    }

    #[tokio::test]
    async fn test_filter_titles() {
        let db = setup_test_db().await;
        let films = create_category_row(&db, "Films", "films").await;
        let books = create_category_row(&db, "Books", "books").await;
        let drama = create_genre_row(&db, "Drama", "drama").await;
        let matrix = create_title_row(&db, "The Matrix", 1999, Some(films.id)).await;
        create_title_row(&db, "Dune", 1965, Some(books.id)).await;
        create_title_row(&db, "Matrix Reloaded", 2003, Some(films.id)).await;
        title_genre::ActiveModel { title_id: Set(matrix.id), genre_id: Set(drama.id) }
            .insert(&db)
            .await
            .unwrap();

        let names = |page: Page<TitleDetails>| -> Vec<String> {
            page.items.into_iter().map(|d| d.title.name).collect()
        };

        let by_name = list_titles(
            &db,
            TitleFilter { name: Some("matrix".into()), ..Default::default() },
            PageRequest::default(),
        )
        .await
        .unwrap();
        assert_eq!(names(by_name), vec!["The Matrix", "Matrix Reloaded"]);

        let by_category = list_titles(
            &db,
            TitleFilter { category: Some("books".into()), ..Default::default() },
            PageRequest::default(),
        )
        .await
        .unwrap();
        assert_eq!(names(by_category), vec!["Dune"]);

        let by_genre_and_year = list_titles(
            &db,
            TitleFilter { genre: Some("drama".into()), year: Some(1999), ..Default::default() },
            PageRequest::default(),
        )
        .await
        .unwrap();
        assert_eq!(names(by_genre_and_year), vec!["The Matrix"]);

        let unknown = list_titles(
            &db,
            TitleFilter { genre: Some("nope".into()), ..Default::default() },
            PageRequest::default(),
        )
        .await
        .unwrap();
        assert_eq!(unknown.total, 0);
    }

    #[tokio::test]
    async fn test_title_rating_is_mean_of_scores() {
        let db = setup_test_db().await;
        let a = create_user_row(&db, "a", Role::User).await;
        let b = create_user_row(&db, "b", Role::User).await;
        let t = create_title_row(&db, "Rated", 2000, None).await;
        create_review_row(&db, a.id, t.id, 8).await;
        create_review_row(&db, b.id, t.id, 10).await;

        assert_eq!(get_title(&db, t.id).await.unwrap().rating, Some(9.0));
    }

    #[tokio::test]
    async fn test_deleting_category_keeps_titles() {
        let db = setup_test_db().await;
        let admin = principal(&create_user_row(&db, "admin", Role::Admin).await);
        let films = create_category_row(&db, "Films", "films").await;
        let t = create_title_row(&db, "Kept", 2000, Some(films.id)).await;

        delete_category(&db, Some(&admin), "films").await.unwrap();
        let kept = get_title(&db, t.id).await.unwrap();
        assert_eq!(kept.title.category_id, None);
        assert_eq!(kept.category, None);
    }

    #[tokio::test]
    async fn test_deleting_genre_only_unlinks() {
        let db = setup_test_db().await;
        let admin = principal(&create_user_row(&db, "admin", Role::Admin).await);
        create_genre_row(&db, "Drama", "drama").await;
        let created = create_title(&db, Some(&admin), new_title("T", &["drama"], None)).await.unwrap();

        delete_genre(&db, Some(&admin), "drama").await.unwrap();
        let after = get_title(&db, created.title.id).await.unwrap();
        assert!(after.genres.is_empty());
    }

    #[tokio::test]
    async fn test_deleting_title_cascades() {
        let db = setup_test_db().await;
        let admin = principal(&create_user_row(&db, "admin", Role::Admin).await);
        let author = create_user_row(&db, "author", Role::User).await;
        let t = create_title_row(&db, "Doomed", 2000, None).await;
        let r = create_review_row(&db, author.id, t.id, 5).await;
        comment::ActiveModel {
            review_id: Set(r.id),
            author_id: Set(author.id),
            text: Set("nice".into()),
            pub_date: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        delete_title(&db, Some(&admin), t.id).await.unwrap();
        assert!(review::Entity::find().all(&db).await.unwrap().is_empty());
        assert!(comment::Entity::find().all(&db).await.unwrap().is_empty());
        assert!(matches!(get_title(&db, t.id).await, Err(DomainError::NotFound(_))));
    }
}
