/*!
 * End-to-end runs of the controller against an in-memory catalog
 */

use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use capfetch::app_config::Config;
use capfetch::app_controller::Controller;
use crate::common::mock_catalog::MockCatalog;
use crate::common::{self, browse_url, BASE};

const SV_HREF: &str = "https://cdn.test/foo_s01e03_SV.xml";
const NO_HREF: &str = "https://cdn.test/foo_s01e03_NO.xml";
const DA_HREF: &str = "https://cdn.test/foo_s01e03_DA.xml";

fn episode_catalog() -> MockCatalog {
    MockCatalog::new()
        .with_node(
            browse_url("ep"),
            common::feed(&[common::episode_item(
                "Foo",
                1,
                3,
                &[(SV_HREF, "sv"), (NO_HREF, "no"), (DA_HREF, "da")],
            )]),
        )
        .with_caption(SV_HREF, common::sample_markup())
        .with_caption(NO_HREF, common::sample_markup())
        .with_caption(DA_HREF, common::sample_markup())
}

fn config_for(output_dir: &Path, languages: &[&str]) -> Config {
    common::init_test_logging();
    let mut config = Config::default();
    config.catalog.base_url = BASE.to_string();
    config.output.directory = output_dir.to_path_buf();
    config.output.languages = languages.iter().map(|l| l.to_string()).collect();
    config
}

#[tokio::test]
async fn test_run_withLanguageFilter_shouldOnlyFetchAcceptedCaptions() {
    let temp_dir = common::create_temp_dir().unwrap();
    let catalog = Arc::new(episode_catalog());
    let controller = Controller::with_parts(config_for(temp_dir.path(), &["sv"]), catalog.clone(), None).unwrap();

    let summary = controller.run("ep", &CancellationToken::new()).await.unwrap();

    assert_eq!(catalog.caption_calls(), vec![SV_HREF.to_string()]);
    assert_eq!(summary.nodes_visited, 1);
    assert_eq!(summary.captions_found, 3);
    assert_eq!(summary.written, 1);
    assert_eq!(summary.skipped_by_filter, 2);
    assert_eq!(summary.failed, 0);

    let raw = temp_dir.path().join("foo.s01e03-se.xml");
    let srt = temp_dir.path().join("foo.s01e03-se.srt");
    assert_eq!(fs::read_to_string(&raw).unwrap(), common::sample_markup());

    let srt_content = fs::read_to_string(&srt).unwrap();
    assert!(srt_content.starts_with("1\n00:00:01,500 --> 00:00:03,000\nHej\ndär\n\n"));
    assert!(srt_content.contains("3\n00:00:07,000 --> 00:00:08,750\nTredje raden\n"));

    assert!(!temp_dir.path().join("foo.s01e03-no.srt").exists());
}

#[tokio::test]
async fn test_run_withoutFilter_shouldWriteEveryLanguage() {
    let temp_dir = common::create_temp_dir().unwrap();
    let catalog = Arc::new(episode_catalog());
    let controller = Controller::with_parts(config_for(temp_dir.path(), &[]), catalog.clone(), None).unwrap();

    let summary = controller.run("ep", &CancellationToken::new()).await.unwrap();

    assert_eq!(summary.written, 3);
    assert_eq!(catalog.caption_calls().len(), 3);
    for name in ["foo.s01e03-se.srt", "foo.s01e03-no.srt", "foo.s01e03-dk.srt"] {
        assert!(temp_dir.path().join(name).exists(), "{} missing", name);
    }
}

#[tokio::test]
async fn test_run_withExistingArtifacts_shouldSkipWithoutFetching() {
    let temp_dir = common::create_temp_dir().unwrap();
    common::create_test_file(temp_dir.path(), "foo.s01e03-se.xml", "old raw").unwrap();
    common::create_test_file(temp_dir.path(), "foo.s01e03-se.srt", "old srt").unwrap();
    let catalog = Arc::new(episode_catalog());
    let controller = Controller::with_parts(config_for(temp_dir.path(), &["sv"]), catalog.clone(), None).unwrap();

    let summary = controller.run("ep", &CancellationToken::new()).await.unwrap();

    assert_eq!(summary.skipped_existing, 1);
    assert_eq!(summary.written, 0);
    assert!(catalog.caption_calls().is_empty());
    assert_eq!(fs::read_to_string(temp_dir.path().join("foo.s01e03-se.srt")).unwrap(), "old srt");
}

#[tokio::test]
async fn test_run_withForceOverwrite_shouldReplaceArtifacts() {
    let temp_dir = common::create_temp_dir().unwrap();
    common::create_test_file(temp_dir.path(), "foo.s01e03-se.srt", "old srt").unwrap();
    let catalog = Arc::new(episode_catalog());
    let mut config = config_for(temp_dir.path(), &["sv"]);
    config.output.force_overwrite = true;
    let controller = Controller::with_parts(config, catalog.clone(), None).unwrap();

    let summary = controller.run("ep", &CancellationToken::new()).await.unwrap();

    assert_eq!(summary.written, 1);
    let srt_content = fs::read_to_string(temp_dir.path().join("foo.s01e03-se.srt")).unwrap();
    assert!(srt_content.starts_with("1\n"));
}

#[tokio::test]
async fn test_run_withRawDisabled_shouldOnlyWriteSrt() {
    let temp_dir = common::create_temp_dir().unwrap();
    let catalog = Arc::new(episode_catalog());
    let mut config = config_for(temp_dir.path(), &["no"]);
    config.output.write_raw = false;
    let controller = Controller::with_parts(config, catalog.clone(), None).unwrap();

    controller.run("ep", &CancellationToken::new()).await.unwrap();

    assert!(temp_dir.path().join("foo.s01e03-no.srt").exists());
    assert!(!temp_dir.path().join("foo.s01e03-no.xml").exists());
}

/// A broken caption asset is counted as failed and does not stop its siblings
#[tokio::test]
async fn test_run_withMissingCaptionAsset_shouldCountFailure() {
    let temp_dir = common::create_temp_dir().unwrap();
    let catalog = Arc::new(
        MockCatalog::new()
            .with_node(
                browse_url("movie"),
                common::feed(&[
                    common::movie_item("Gone", &[("https://cdn.test/gone_SV.xml", "sv")]),
                    common::movie_item("Here", &[("https://cdn.test/here_SV.xml", "sv")]),
                ]),
            )
            .with_caption("https://cdn.test/here_SV.xml", common::sample_markup()),
    );
    let controller = Controller::with_parts(config_for(temp_dir.path(), &[]), catalog.clone(), None).unwrap();

    let summary = controller.run("movie", &CancellationToken::new()).await.unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.written, 1);
    assert!(temp_dir.path().join("here-se.srt").exists());
}

/// The same episode featured on the show page and listed on its season page
#[tokio::test]
async fn test_run_withCaptionListedTwice_shouldFetchAndWriteOnce() {
    let temp_dir = common::create_temp_dir().unwrap();
    let featured = common::episode_item("Foo", 1, 3, &[(SV_HREF, "sv")]);
    let catalog = Arc::new(
        MockCatalog::new()
            .with_node(
                browse_url("show"),
                common::feed(&[featured.clone(), common::season_item("Season 1", "s1")]),
            )
            .with_node(browse_url("s1"), common::feed(&[featured]))
            .with_caption(SV_HREF, common::sample_markup()),
    );
    let controller = Controller::with_parts(config_for(temp_dir.path(), &[]), catalog.clone(), None).unwrap();

    let targets = controller.list("show", &CancellationToken::new()).await.unwrap();
    assert_eq!(targets.len(), 1);

    let summary = controller.run("show", &CancellationToken::new()).await.unwrap();

    assert_eq!(catalog.caption_calls(), vec![SV_HREF.to_string()]);
    assert_eq!(summary.nodes_visited, 2);
    assert_eq!(summary.captions_found, 1);
    assert_eq!(summary.written, 1);
}

#[tokio::test]
async fn test_list_shouldReturnFilteredTargetsWithoutDownloading() {
    let temp_dir = common::create_temp_dir().unwrap();
    let catalog = Arc::new(episode_catalog());
    let controller =
        Controller::with_parts(config_for(temp_dir.path(), &["no", "da"]), catalog.clone(), None).unwrap();

    let targets = controller.list("ep", &CancellationToken::new()).await.unwrap();

    let mut languages: Vec<_> = targets.iter().map(|t| t.caption.language.clone()).collect();
    languages.sort();
    assert_eq!(languages, vec!["DA".to_string(), "NO".to_string()]);
    assert!(catalog.caption_calls().is_empty());
    assert!(fs::read_dir(temp_dir.path()).unwrap().next().is_none());
}

#[test]
fn test_run_withCancelledToken_shouldFail() {
    let temp_dir = common::create_temp_dir().unwrap();
    let catalog = Arc::new(episode_catalog());
    let controller = Controller::with_parts(config_for(temp_dir.path(), &[]), catalog.clone(), None).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = tokio_test::block_on(async { controller.run("ep", &cancel).await });

    assert!(result.is_err());
    assert!(catalog.caption_calls().is_empty());
}

#[test]
fn test_withParts_withUnknownLanguage_shouldFail() {
    let temp_dir = common::create_temp_dir().unwrap();
    let result = Controller::with_parts(config_for(temp_dir.path(), &["xx-nope"]), Arc::new(MockCatalog::new()), None);
    assert!(result.is_err());
}
