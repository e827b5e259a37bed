//! Offset pagination and search filters over SeaORM selects.

use sea_orm::sea_query::{Expr, Func, IntoColumnRef, LikeExpr, SimpleExpr};
use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait, Select};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const MAX_PAGE_SIZE: u64 = 100;

/// 1-based page number and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    /// Clamps out-of-range values instead of rejecting them.
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_PAGE_SIZE),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, 10)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Number of matching rows across all pages.
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

impl<T> Page<T> {
    /// Swaps the items for an already-transformed list of the same page.
    pub fn with_items<U>(self, items: Vec<U>) -> Page<U> {
        Page {
            items,
            total: self.total,
            page: self.page,
            limit: self.limit,
        }
    }
}

/// Runs `select` as a page query. The select should carry a deterministic
/// order.
pub async fn fetch_page<C, E>(db: &C, select: Select<E>, request: PageRequest) -> Result<Page<E::Model>>
where
    C: ConnectionTrait,
    E: EntityTrait,
    E::Model: Sync,
{
    let paginator = select.paginate(db, request.limit);
    let total = paginator.num_items().await?;
    let items = paginator.fetch_page(request.page - 1).await?;
    Ok(Page {
        items,
        total,
        page: request.page,
        limit: request.limit,
    })
}

const LIKE_ESCAPE: char = '!';

fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.to_lowercase().chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Case-insensitive substring match on `column`. Wildcards in `term` match
/// themselves.
pub fn contains_ignore_case<C: IntoColumnRef>(column: C, term: &str) -> SimpleExpr {
    Expr::expr(Func::lower(Expr::col(column)))
        .like(LikeExpr::new(like_pattern(term)).escape(LIKE_ESCAPE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_is_clamped() {
        assert_eq!(PageRequest::new(0, 0), PageRequest { page: 1, limit: 1 });
        assert_eq!(PageRequest::new(3, 500), PageRequest { page: 3, limit: MAX_PAGE_SIZE });
    }

    #[test]
    fn test_with_items_keeps_counts() {
        let page = Page { items: vec![1, 2], total: 7, page: 2, limit: 2 };
        let swapped = page.with_items(vec!["a", "b"]);
        assert_eq!(swapped.items, vec!["a", "b"]);
        assert_eq!((swapped.total, swapped.page, swapped.limit), (7, 2, 2));
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("Dune"), "%dune%");
        assert_eq!(like_pattern("%"), "%!%%");
        assert_eq!(like_pattern("D_ne"), "%d!_ne%");
        assert_eq!(like_pattern("wow!"), "%wow!!%");
    }
}
