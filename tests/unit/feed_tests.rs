/*!
 * Tests for feed parsing and item classification
 */

use capfetch::catalog::feed::{ContainerDetection, FeedParser};
use capfetch::catalog::{CaptionRef, CaptionTarget, FeedItem, Naming};
use capfetch::errors::CatalogError;
use crate::common::{self, browse_url};

#[test]
fn test_parse_withEpisodeItem_shouldYieldEpisodeStem() {
    let doc = common::feed(&[common::episode_item(
        "Foo",
        1,
        3,
        &[("https://cdn.test/foo_SV.xml", "sv"), ("https://cdn.test/foo_NO.xml", "no")],
    )]);

    let parsed = FeedParser::default().parse(&doc, "test").unwrap();
    assert_eq!(parsed.items.len(), 1);
    match &parsed.items[0] {
        FeedItem::Leaf(leaf) => {
            assert_eq!(leaf.naming.stem(), "Foo.S01E03");
            let langs: Vec<_> = leaf.captions.iter().map(|c| c.language.as_str()).collect();
            assert_eq!(langs, vec!["SV", "NO"]);
        }
        other => panic!("expected a leaf, got {:?}", other),
    }
}

#[test]
fn test_parse_withMovieItem_shouldUseTitle() {
    let doc = common::feed(&[common::movie_item("Bar Movie", &[("https://cdn.test/bar_DA.xml", "")])]);

    let parsed = FeedParser::default().parse(&doc, "test").unwrap();
    match &parsed.items[0] {
        FeedItem::Leaf(leaf) => {
            assert_eq!(leaf.naming, Naming::Title("Bar Movie".to_string()));
            // No attribute value, so the URL suffix decides
            assert_eq!(leaf.captions[0].language, "DA");
        }
        other => panic!("expected a leaf, got {:?}", other),
    }
}

#[test]
fn test_parse_withKeywordMarker_shouldOnlyKeepMarkedContainers() {
    let doc = common::feed(&[
        common::season_item("Season 1", "s1"),
        common::unrelated_item("Trailer", "trailer"),
    ]);

    let parsed = FeedParser::new(ContainerDetection::KeywordMarker, "season")
        .parse(&doc, "test")
        .unwrap();
    assert_eq!(parsed.ignored, 1);
    match parsed.items.as_slice() {
        [FeedItem::Container(container)] => assert_eq!(container.link, browse_url("s1")),
        other => panic!("unexpected items {:?}", other),
    }
}

#[test]
fn test_parse_withMissingCaptionsDetection_shouldTreatEveryLinkAsContainer() {
    let doc = common::feed(&[
        common::season_item("Season 1", "s1"),
        common::unrelated_item("Trailer", "trailer"),
    ]);

    let parsed = FeedParser::new(ContainerDetection::MissingCaptions, "season")
        .parse(&doc, "test")
        .unwrap();
    assert_eq!(parsed.items.len(), 2);
    assert_eq!(parsed.ignored, 0);
}

/// A caption reference wins over a season keyword
#[test]
fn test_parse_withCaptionsAndKeyword_shouldBeLeaf() {
    let item = r#"<item>
      <title>Pilot</title>
      <media:keywords>season</media:keywords>
      <media:subtitle href="https://cdn.test/pilot_FI.xml" lang="fi"/>
      <link>https://catalog.test/cloffice/client/web/browse/x</link>
    </item>"#;
    let doc = common::feed(&[item.to_string()]);

    let parsed = FeedParser::default().parse(&doc, "test").unwrap();
    assert!(matches!(parsed.items.as_slice(), [FeedItem::Leaf(_)]));
}

#[test]
fn test_parse_withMalformedLeaf_shouldSkipItemAndKeepOthers() {
    let broken = r#"<item>
      <media:subtitle href="https://cdn.test/nameless_SV.xml" lang="sv"/>
    </item>"#;
    let doc = common::feed(&[
        broken.to_string(),
        common::movie_item("Good", &[("https://cdn.test/good_SV.xml", "sv")]),
    ]);

    let parsed = FeedParser::default().parse(&doc, "test").unwrap();
    assert_eq!(parsed.items.len(), 1);
    assert!(matches!(
        parsed.errors.as_slice(),
        [CatalogError::MalformedFeedItem { index: 0, .. }]
    ));
}

#[test]
fn test_parse_withUnparseableDocument_shouldFail() {
    let result = FeedParser::default().parse("<rss><channel>", "https://catalog.test/x");
    assert!(matches!(result, Err(CatalogError::MalformedFeed { .. })));
}

#[test]
fn test_listing_shouldNameKnownLanguages() {
    let target = |language: &str| CaptionTarget {
        caption: CaptionRef {
            href: "https://cdn.test/foo_SV.xml".to_string(),
            language: language.to_string(),
        },
        stem: "Foo.S01E03".to_string(),
        node_url: browse_url("s1"),
    };

    assert_eq!(
        target("SV").listing(),
        "Foo.S01E03\tSV (Swedish)\thttps://cdn.test/foo_SV.xml"
    );
    assert_eq!(
        target("UND").listing(),
        "Foo.S01E03\tUND\thttps://cdn.test/foo_SV.xml"
    );
}
