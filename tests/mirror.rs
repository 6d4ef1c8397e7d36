//! End-to-end tests for the mirror pipeline.
//!
//! A wiremock server plays the upstream CMS (and, for archiving, the
//! write-once archive endpoint).

use cms_mirror::archive::ArchiveReport;
use cms_mirror::models::{Config, CrawlRecord, FileRecord, InternetArchiveConfig};
use cms_mirror::pipeline::{self, CrawlOptions};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HOME: &str = r#"<html><body>
<div id="zz1_QuickLaunchMenu">
  <a href="/Documents/Forms/AllItems.aspx">Documents</a>
  <a href="/Circulars/Pages/Default.aspx">Circulars</a>
</div>
<span class="breadcrumbCurrent">Home</span>
<div class="mainContent">
  <p>Welcome<br><br><br><br>to the mirror</p>
  <a href="/Documents/Notice.pdf">notice</a>
</div>
</body></html>"#;

const CIRCULARS: &str = r#"<html><body>
<div id="ctl00_PlaceHolderTitleBreadcrumb_siteMapPath"><a href="/Pages/Default.aspx">Home</a></div>
<span class="breadcrumbCurrent">Circulars</span>
<div class="mainContent"><p class="lead">Circular list</p></div>
</body></html>"#;

fn row(label: &str, href: &str) -> String {
    format!(
        r#"<tr>
          <td class="ms-vb-title"><table class="ms-unselectedtitle"><tr>
            <td class="ms-vb"><a href="{href}">{label}</a></td>
          </tr></table></td>
          <td class="ms-vb2"><nobr>2019/05/02 10:11</nobr></td>
          <td class="ms-vb-user"><span>Jane Doe</span></td>
        </tr>"#
    )
}

fn listing(rows: &[(&str, &str)], next: bool) -> String {
    let rows: String = rows.iter().map(|(label, href)| row(label, href)).collect();
    let pager = if next {
        r#"<img alt="Next" src="/_layouts/images/next.gif">"#
    } else {
        ""
    };
    format!(
        r#"<html><body>
        <span class="breadcrumbCurrent">Documents</span>
        <div class="mainContent"><table><tr><td id="MSOZoneCell_WebPartWPQ2">
          <table>{rows}</table>{pager}
        </td></tr></table></div>
        </body></html>"#
    )
}

async fn mount_html(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_site(server: &MockServer) {
    // Second page of the listing; mounted first so it wins over page one.
    Mock::given(method("GET"))
        .and(path("/Documents/Forms/AllItems.aspx"))
        .and(query_param("Paged", "TRUE"))
        .and(query_param("p_FileLeafRef", "Report B"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing(
            &[("Report C", "/Documents/Report%20C.pdf")],
            false,
        )))
        .mount(server)
        .await;
    mount_html(
        server,
        "/Documents/Forms/AllItems.aspx",
        listing(
            &[
                ("Report A", "/Documents/Report%20A.pdf"),
                ("Report B", "/Documents/Report%20B.pdf"),
            ],
            true,
        ),
    )
    .await;
    mount_html(server, "/", HOME.to_string()).await;
    mount_html(server, "/Circulars/Pages/Default.aspx", CIRCULARS.to_string()).await;
}

/// Parsed YAML front matter of a written page.
fn front_matter(page: &str) -> serde_yaml::Value {
    let rest = page.strip_prefix("---\n").unwrap();
    let (yaml, _) = rest.split_once("\n---\n").unwrap();
    serde_yaml::from_str(yaml).unwrap()
}

fn config_for(server: &MockServer, temp: &TempDir) -> Config {
    let mut config = Config::default();
    config.site.base_url = server.uri();
    config.site.start_urls = vec![format!("{}/", server.uri())];
    config.crawler.max_concurrent = 2;
    config.output.site_dir = temp.path().join("site");
    config.output.cache_dir = temp.path().join("cache");
    config.output.items_file = Some(temp.path().join("items.json"));
    config
}

#[tokio::test]
async fn test_crawl_writes_depaginated_mirror() {
    let server = MockServer::start().await;
    mount_site(&server).await;
    let temp = TempDir::new().unwrap();
    let config = config_for(&server, &temp);

    let summary = pipeline::run_crawl(&config, &CrawlOptions::from_config(&config))
        .await
        .unwrap();

    assert_eq!(summary.fetch.failures, 0);
    assert_eq!(summary.fetch.documents, 4);
    assert_eq!(summary.site.pages, 3);
    assert_eq!(summary.site.menu_items, 2);
    assert_eq!(summary.files, 4);
    assert!(summary.archive.is_empty());

    let site = temp.path().join("site");
    let menu = std::fs::read_to_string(site.join("_data/menu.json")).unwrap();
    assert!(menu.contains("\"/Documents/\""));
    assert!(menu.contains("\"/Circulars/\""));

    let home = std::fs::read_to_string(site.join("index.html")).unwrap();
    assert_eq!(front_matter(&home)["title"].as_str(), Some("Home"));
    assert!(home.contains("<p>Welcome<br><br>to the mirror</p>"));

    let documents = std::fs::read_to_string(site.join("Documents/index.html")).unwrap();
    let documents = front_matter(&documents);
    assert_eq!(documents["layout"].as_str(), Some("listing"));
    let rows = documents["form_table_rows"].as_sequence().unwrap();
    let labels: Vec<&str> = rows.iter().filter_map(|r| r["label"].as_str()).collect();
    assert_eq!(labels, vec!["Report A", "Report B", "Report C"]);
    assert_eq!(
        rows[2]["path"].as_str(),
        Some(format!("{}/Documents/Report%20C.pdf", server.uri()).as_str())
    );

    let circulars = std::fs::read_to_string(site.join("Circulars/index.html")).unwrap();
    assert!(circulars.contains("<div><p>Circular list</p></div>"));
    assert_eq!(
        front_matter(&circulars)["breadcrumbs"].as_str(),
        Some(r#"<div><a href="/">Home</a></div>"#)
    );
}

#[tokio::test]
async fn test_build_reproduces_crawl_output() {
    let server = MockServer::start().await;
    mount_site(&server).await;
    let temp = TempDir::new().unwrap();
    let config = config_for(&server, &temp);

    pipeline::run_crawl(&config, &CrawlOptions::from_config(&config))
        .await
        .unwrap();
    let crawled = std::fs::read_to_string(temp.path().join("site/Documents/index.html")).unwrap();

    let items = temp.path().join("items.json");
    let records = pipeline::load_items(&items).await.unwrap();
    let pages = records
        .iter()
        .filter(|r| matches!(r, CrawlRecord::Page(_)))
        .count();
    assert_eq!(pages, 4);

    let mut rebuild = config.clone();
    rebuild.output.site_dir = temp.path().join("rebuilt");
    let report = pipeline::run_build(&rebuild, &items).await.unwrap();
    assert_eq!(report.pages, 3);

    let rebuilt = std::fs::read_to_string(temp.path().join("rebuilt/Documents/index.html")).unwrap();
    assert_eq!(crawled, rebuilt);
}

#[tokio::test]
async fn test_crawl_without_menu_or_archive() {
    let server = MockServer::start().await;
    mount_site(&server).await;
    let temp = TempDir::new().unwrap();
    let config = config_for(&server, &temp);

    let options = CrawlOptions {
        scrape_menu: false,
        archive: false,
        ..CrawlOptions::from_config(&config)
    };
    let summary = pipeline::run_crawl(&config, &options).await.unwrap();

    // Only the home page and what its content links to.
    assert_eq!(summary.fetch.documents, 1);
    assert_eq!(summary.site.menu_items, 0);
    assert!(!temp.path().join("site/_data/menu.json").exists());
}

#[tokio::test]
async fn test_encoded_parent_segments_stay_inside_site() {
    let server = MockServer::start().await;
    let escaping = "/x%2F..%2F..%2Fescaped.aspx";
    mount_html(
        &server,
        "/",
        format!(r#"<html><body><div class="mainContent"><a href="{escaping}">x</a></div></body></html>"#),
    )
    .await;
    mount_html(&server, escaping, CIRCULARS.to_string()).await;
    let temp = TempDir::new().unwrap();
    let config = config_for(&server, &temp);

    let summary = pipeline::run_crawl(&config, &CrawlOptions::from_config(&config))
        .await
        .unwrap();

    assert_eq!(summary.fetch.documents, 2);
    assert_eq!(summary.site.pages, 1);
    assert_eq!(summary.site.skipped, 1);
    assert!(!temp.path().join("escaped").exists());
    assert!(temp.path().join("site/index.html").exists());
}

#[tokio::test]
async fn test_archive_pass_is_idempotent() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();

    // Upstream document: conditional requests with the current ETag get 304.
    Mock::given(method("GET"))
        .and(path("/Documents/Plan.pdf"))
        .and(header("if-none-match", "\"v1\""))
        .respond_with(ResponseTemplate::new(304))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Documents/Plan.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("etag", "\"v1\"")
                .insert_header("last-modified", "Tue, 15 Nov 1994 12:45:26 GMT")
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(b"%PDF-1.4".to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;

    // Archive endpoint: nothing exists yet; container and object are created.
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/documents_plan_pdf"))
        .and(header("x-archive-meta-title", "Plan"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/documents_plan_pdf/Documents/Plan.pdf"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config_for(&server, &temp);
    config.archive.internet_archive = Some(InternetArchiveConfig {
        endpoint: server.uri(),
        access_key: "key".to_string(),
        secret_key: "secret".to_string(),
        ..InternetArchiveConfig::default()
    });

    let items = temp.path().join("files.json");
    let records = vec![CrawlRecord::File(FileRecord {
        original_url: format!("{}/Documents/Plan.pdf", server.uri()),
        path: "/Documents/Plan.pdf".to_string(),
    })];
    pipeline::save_items(&items, &records).await.unwrap();

    let first = pipeline::run_archive(&config, &items).await.unwrap();
    assert_eq!(
        first,
        vec![ArchiveReport {
            backend: "internet-archive".to_string(),
            total: 1,
            uploaded: 1,
            ..ArchiveReport::default()
        }]
    );

    let second = pipeline::run_archive(&config, &items).await.unwrap();
    assert_eq!(second[0].unchanged, 1);
    assert_eq!(second[0].uploaded, 0);
}
