mod common;

use bson::{Bson, doc};

use querylayer_core::{
    collection::QueryRunner,
    page::PaginationParams,
    query::{Filter, Projection, Query, Sort, SortDirection},
};

use common::{bookstore, store_with, titles};

#[tokio::test]
async fn filters_are_conjunctive_across_fields() {
    let store = bookstore().await;

    let found = store
        .collection("books")
        .find(
            Query::builder()
                .filter(Filter::and([
                    Filter::eq("in_stock", true),
                    Filter::gt("published_year", 1950),
                ]))
                .build(),
        )
        .await
        .unwrap();

    assert_eq!(
        titles(&found),
        ["The Lord of the Rings", "The Catcher in the Rye", "To Kill a Mockingbird"]
    );
}

#[tokio::test]
async fn no_match_is_an_empty_result() {
    let store = bookstore().await;

    let found = store
        .collection("books")
        .find(Query::builder().filter(Filter::eq("genre", "Poetry")).build())
        .await
        .unwrap();

    assert!(found.is_empty());
}

#[tokio::test]
async fn missing_collection_reads_as_empty() {
    let store = bookstore().await;

    assert!(store.collection("magazines").find(Query::new()).await.unwrap().is_empty());
    assert_eq!(store.collection("magazines").count(None).await.unwrap(), 0);
}

#[tokio::test]
async fn unsorted_results_keep_insertion_order() {
    let store = bookstore().await;

    let found = store.collection("books").find(Query::new()).await.unwrap();

    assert_eq!(found.len(), 10);
    assert_eq!(titles(&found)[0], "1984");
    assert_eq!(titles(&found)[9], "Dune");
}

#[tokio::test]
async fn pagination_applies_after_sorting() {
    let store = bookstore().await;

    let found = store
        .collection("books")
        .find(
            Query::builder()
                .sort("price", SortDirection::Asc)
                .skip(2)
                .limit(3)
                .build(),
        )
        .await
        .unwrap();

    assert_eq!(titles(&found), ["Fahrenheit 451", "1984", "The Catcher in the Rye"]);
}

#[tokio::test]
async fn skipping_past_the_end_is_empty_and_zero_limit_is_unbounded() {
    let store = bookstore().await;
    let books = store.collection("books");

    let past_end = books.find(Query::builder().skip(10).limit(5).build()).await.unwrap();
    let unbounded = books.find(Query::builder().limit(0).build()).await.unwrap();

    assert!(past_end.is_empty());
    assert_eq!(unbounded.len(), 10);
}

#[tokio::test]
async fn ascending_and_descending_sorts_are_reversed() {
    let store = bookstore().await;
    let books = store.collection("books");

    let ascending = books
        .find(Query::builder().sort("price", SortDirection::Asc).build())
        .await
        .unwrap();
    let mut descending = books
        .find(Query::builder().sort("price", SortDirection::Desc).build())
        .await
        .unwrap();

    descending.reverse();
    assert_eq!(ascending, descending);
    assert_eq!(titles(&ascending)[0], "Pride and Prejudice");
}

#[tokio::test]
async fn compound_sorts_apply_keys_in_order() {
    let store = bookstore().await;

    let found = store
        .collection("books")
        .find(
            Query::builder()
                .filter(Filter::eq("author", "George Orwell"))
                .sort("author", SortDirection::Asc)
                .sort("published_year", SortDirection::Desc)
                .build(),
        )
        .await
        .unwrap();

    assert_eq!(titles(&found), ["1984", "Animal Farm"]);
}

#[tokio::test]
async fn projection_drops_the_store_key_unless_requested() {
    let store = bookstore().await;
    let books = store.collection("books");

    let without_id = books
        .find(
            Query::builder()
                .filter(Filter::eq("title", "Dune"))
                .project(Projection::fields(["title", "author"]))
                .build(),
        )
        .await
        .unwrap();

    let fields = without_id[0]
        .as_document()
        .unwrap()
        .keys()
        .cloned()
        .collect::<Vec<_>>();
    assert_eq!(fields, ["title", "author"]);

    let with_id = books
        .find(
            Query::builder()
                .filter(Filter::eq("title", "Dune"))
                .project(Projection::fields(["title"]).with_id())
                .build(),
        )
        .await
        .unwrap();

    let document = with_id[0].as_document().unwrap();
    assert!(matches!(document.get("_id"), Some(Bson::ObjectId(_))));
    assert_eq!(document.len(), 2);
}

#[tokio::test]
async fn listing_the_store_key_keeps_it() {
    let store = bookstore().await;

    let found = store
        .collection("books")
        .find(
            Query::builder()
                .filter(Filter::eq("title", "Dune"))
                .project(Projection::fields(["_id", "title"]))
                .build(),
        )
        .await
        .unwrap();

    let document = found[0].as_document().unwrap();
    assert!(matches!(document.get("_id"), Some(Bson::ObjectId(_))));
    assert_eq!(document.get_str("title").unwrap(), "Dune");
    assert_eq!(document.len(), 2);
}

#[tokio::test]
async fn large_integers_filter_and_sort_exactly() {
    let big = 1i64 << 62;
    let store = store_with(
        "counters",
        vec![
            Bson::Document(doc! { "name": "next", "n": big + 1 }),
            Bson::Document(doc! { "name": "base", "n": big }),
        ],
    )
    .await;
    let counters = store.collection("counters");

    let exact = counters
        .find(Query::builder().filter(Filter::eq("n", big)).build())
        .await
        .unwrap();
    assert_eq!(exact.len(), 1);
    assert_eq!(exact[0].as_document().unwrap().get_str("name").unwrap(), "base");

    let above = counters
        .find(Query::builder().filter(Filter::gt("n", big)).build())
        .await
        .unwrap();
    assert_eq!(above.len(), 1);

    let sorted = counters
        .find(Query::builder().sort("n", SortDirection::Asc).build())
        .await
        .unwrap()
        .iter()
        .map(|document| document.as_document().unwrap().get_i64("n").unwrap())
        .collect::<Vec<_>>();
    assert_eq!(sorted, [big, big + 1]);
}

#[tokio::test]
async fn pages_report_their_neighbours() {
    let store = bookstore().await;

    let page = store
        .collection("books")
        .find_page(None, vec![Sort::asc("title")], PaginationParams::new(2, 5))
        .await
        .unwrap();

    assert_eq!(page.count, 10);
    assert_eq!(page.items.len(), 5);
    assert_eq!(page.next_page, None);
    assert_eq!(page.previous_page, Some(1));
    assert_eq!(titles(&page.items)[0], "Pride and Prejudice");
}
