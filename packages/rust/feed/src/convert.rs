//! `feed-rs` model → [`Item`] conversion.

use chrono::{DateTime, Utc};
use feed_rs::model::{Entry, Feed, Person};
use feedherald_shared::Item;

/// Convert parsed feed entries to items, sorted newest first.
///
/// Entries without any usable link are dropped. Sorting is stable and by
/// published (or updated) time; undated entries keep their document order
/// after all dated ones. Undated items are stamped with `fetched_at`.
pub fn entries_to_items(feed: Feed, fetched_at: DateTime<Utc>) -> Vec<Item> {
    let mut dated: Vec<(Option<DateTime<Utc>>, Item)> = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let published = entry.published.or(entry.updated);
            let item = entry_to_item(entry, published.unwrap_or(fetched_at))?;
            Some((published, item))
        })
        .collect();

    dated.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => b.cmp(a),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    dated.into_iter().map(|(_, item)| item).collect()
}

fn entry_to_item(entry: Entry, published: DateTime<Utc>) -> Option<Item> {
    let link = entry
        .links
        .first()
        .map(|l| l.href.clone())
        .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))?;

    let author = entry
        .authors
        .into_iter()
        .filter_map(person_name)
        .collect::<Vec<_>>()
        .join(", ");

    Some(Item {
        id: entry.id,
        title: entry
            .title
            .map(|t| t.content.trim().to_string())
            .unwrap_or_default(),
        link,
        author,
        published: published.to_rfc3339(),
    })
}

/// Display name for a feed author.
///
/// RSS `<author>` arrives as a person named `"author"` with the value in
/// `email`; other sources carry the name itself.
fn person_name(person: Person) -> Option<String> {
    let name = person.name.trim();
    if !name.is_empty() && name != "author" {
        return Some(name.to_string());
    }
    person
        .email
        .map(|email| email.trim().to_string())
        .filter(|email| !email.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Releases</title>
    <link>https://example.com</link>
    <description>Latest chapters</description>
    <item>
      <title>Old Series Chapter 4</title>
      <link>https://example.com/old-4</link>
      <guid>old-4</guid>
      <author>alice</author>
      <pubDate>Mon, 01 Jan 2024 08:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Undated Special</title>
      <link>https://example.com/special</link>
      <guid>special</guid>
    </item>
    <item>
      <title>New Series Chapter 10</title>
      <link>https://example.com/new-10</link>
      <guid>new-10</guid>
      <author>bob</author>
      <pubDate>Wed, 03 Jan 2024 08:00:00 GMT</pubDate>
    </item>
    <item>
      <title>No Link</title>
      <guid>no-link</guid>
      <pubDate>Thu, 04 Jan 2024 08:00:00 GMT</pubDate>
    </item>
  </channel>
</rss>"#;

    fn parse(xml: &str) -> Feed {
        feed_rs::parser::parse(xml.as_bytes()).expect("parse fixture")
    }

    #[test]
    fn sorts_newest_first_with_undated_last() {
        let fetched_at = Utc::now();
        let items = entries_to_items(parse(RSS), fetched_at);

        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["new-10", "old-4", "special"]);
        assert_eq!(items[2].published, fetched_at.to_rfc3339());
    }

    #[test]
    fn maps_entry_fields() {
        let items = entries_to_items(parse(RSS), Utc::now());
        let newest = &items[0];

        assert_eq!(newest.title, "New Series Chapter 10");
        assert_eq!(newest.link, "https://example.com/new-10");
        assert_eq!(newest.author, "bob");
        assert_eq!(newest.published, "2024-01-03T08:00:00+00:00");
    }

    #[test]
    fn rss_author_uses_address_and_atom_author_uses_name() {
        let person = |name: &str, email: Option<&str>| {
            Person {
                name: name.trim().into(),
                uri: None,
                email: email.map(Into::into),
            }
        };

        assert_eq!(person_name(person("author", Some("bob"))).as_deref(), Some("bob"));
        assert_eq!(person_name(person(" ", Some("carol"))).as_deref(), Some("carol"));
        assert_eq!(person_name(person("Dana", None)).as_deref(), Some("Dana"));
        assert_eq!(person_name(person("author", None)), None);
    }

    #[test]
    fn drops_entries_without_links() {
        let items = entries_to_items(parse(RSS), Utc::now());
        assert!(items.iter().all(|i| i.id != "no-link"));
    }
}
