use std::{
    collections::HashMap,
    io::{Read, Write},
    net::TcpListener,
    path::PathBuf,
    thread,
};

use anyhow::Result;
use rne_explorer::{
    columns::{LATITUDE, LONGITUDE, TOWN_CODE},
    config::HttpSettings,
    export::to_csv_string,
    fetch::ensure_cached,
    summary::filter_options,
    DataSource, DownloadCache, ExplorerError, FilterCriteria, HttpTransport, Session, Transport,
};
use tempfile::tempdir;

/// Serve a single HTTP response on a random local port and return its URL.
fn serve_once(status: &'static str, body: &'static str) -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf);
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });
    Ok(format!("http://{}/data.csv", addr))
}

#[test]
fn http_404_is_a_transport_error_and_leaves_no_file() -> Result<()> {
    let url = serve_once("404 Not Found", "")?;
    let tmp = tempdir()?;
    let path = tmp.path().join("elus.csv");
    let transport = HttpTransport::new(&HttpSettings::default())?;

    let err = ensure_cached(&transport, &url, &path).unwrap_err();
    assert!(matches!(err, ExplorerError::Transport { url: u, .. } if u == url));
    assert!(!path.exists());
    assert_eq!(std::fs::read_dir(tmp.path())?.count(), 0);
    Ok(())
}

#[test]
fn http_200_writes_the_body_once() -> Result<()> {
    let url = serve_once("200 OK", "a;b\n1;2\n")?;
    let tmp = tempdir()?;
    let path = tmp.path().join("nested").join("elus.csv");
    let transport = HttpTransport::new(&HttpSettings::default())?;

    ensure_cached(&transport, &url, &path)?;
    assert_eq!(std::fs::read_to_string(&path)?, "a;b\n1;2\n");

    // The one-shot server is gone; a second call must not hit the network.
    ensure_cached(&transport, &url, &path)?;
    Ok(())
}

struct StaticTransport(HashMap<String, &'static str>);

impl Transport for StaticTransport {
    fn get(&self, url: &str) -> rne_explorer::Result<Vec<u8>> {
        self.0
            .get(url)
            .map(|body| body.as_bytes().to_vec())
            .ok_or_else(|| ExplorerError::transport(url, "404 Not Found"))
    }
}

const OFFICIALS: &str = "\u{feff}Code du département;Libellé du département;Code de la commune;Libellé de la commune;Nom de l'élu;Prénom de l'élu;Code sexe\n\
01;Ain;1234;Village;DUPONT;Jean;M\n\
09;Ariège;09999;Ailleurs;MARTIN;Anne;F\n\
13;Bouches-du-Rhône;;Nulle part;PAYAN;Benoît;M\n";

const TOWNS: &str = "code_commune_INSEE,nom_commune,latitude,longitude\n01234,Village,1.0,2.0\n";

#[test]
fn end_to_end_left_join_keeps_every_official() -> Result<()> {
    let tmp = tempdir()?;
    let transport = StaticTransport(HashMap::from([
        ("http://rne.test/elus".to_string(), OFFICIALS),
        ("http://rne.test/communes".to_string(), TOWNS),
    ]));
    let session = Session::new(
        DownloadCache::new(tmp.path(), transport),
        DataSource {
            url: "http://rne.test/elus".into(),
            file: PathBuf::from("elus.csv"),
        },
        DataSource {
            url: "http://rne.test/communes".into(),
            file: PathBuf::from("communes.csv"),
        },
    );

    let outcome = session.query(&FilterCriteria::new());
    assert!(!outcome.is_degraded(), "{:?}", outcome.error());
    let table = outcome.value();
    assert_eq!(table.len(), 3);
    assert_eq!(table.get(0, TOWN_CODE), Some("01234"));
    assert_eq!(table.float(0, LATITUDE), Some(1.0));
    assert_eq!(table.float(0, LONGITUDE), Some(2.0));
    for row in 1..3 {
        assert_eq!(table.get(row, LATITUDE), None);
        assert_eq!(table.get(row, LONGITUDE), None);
    }
    assert!(tmp.path().join("elus.csv").exists());
    assert!(tmp.path().join("communes.csv").exists());

    let women = session.query(&FilterCriteria::new().genders(["F"]).town_contains("AILL"));
    assert_eq!(women.value().len(), 1);

    let rows = to_csv_string(women.value())?;
    let lines: Vec<&str> = rows.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("code_du_departement,"));
    assert!(lines[1].contains("MARTIN"));

    // choices come from the whole dataset, not from the last query
    let options = filter_options(&session.dataset().into_value());
    assert_eq!(options.territories, vec!["01", "09", "13"]);
    assert_eq!(options.genders, vec!["F", "M"]);
    Ok(())
}
