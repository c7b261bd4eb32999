//! Fetchers against a throwaway local HTTP server.

use country_fx::error::{ErrorKind, UpstreamApi};
use country_fx::{Client, Error, Settings, Upstream};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::thread;

/// Serve exactly one request with the given status line and body; return its URL.
fn serve_once(status: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut line = String::new();
        // Drain request headers.
        while reader.read_line(&mut line).unwrap() > 0 {
            if line == "\r\n" || line == "\n" {
                break;
            }
            line.clear();
        }
        let resp = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(resp.as_bytes()).unwrap();
        stream.flush().unwrap();
    });
    format!("http://{addr}/")
}

fn client(countries_url: String, rates_url: String) -> Client {
    Client::from_settings(&Settings {
        countries_url,
        rates_url,
        timeout_secs: 5,
        connect_timeout_secs: 2,
        ..Settings::default()
    })
    .unwrap()
}

const COUNTRIES: &str = r#"[
  {"name":"Testland","capital":"Test City","region":"Nowhere","population":1000,
   "flag":"https://flags.example/tst.svg","currencies":[{"code":"TST","name":"Test coin","symbol":"T"}]}
]"#;

#[test]
fn fetches_countries_from_2xx() {
    let c = client(serve_once("200 OK", COUNTRIES), "http://127.0.0.1:9/".into());
    let countries = c.fetch_countries().unwrap();
    assert_eq!(countries.len(), 1);
    assert_eq!(countries[0].name, "Testland");
    assert_eq!(countries[0].currency_code(), Some("TST"));
}

#[test]
fn fetches_rates_from_2xx() {
    let body = r#"{"result":"success","base_code":"USD","rates":{"USD":1,"TST":2.5}}"#;
    let c = client("http://127.0.0.1:9/".into(), serve_once("200 OK", body));
    let rates = c.fetch_exchange_rates().unwrap();
    assert_eq!(rates.base_code, "USD");
    assert_eq!(rates.rate("TST"), Some(2.5));
}

#[test]
fn non_2xx_is_unavailable() {
    let c = client(
        serve_once("503 Service Unavailable", r#"{"message":"down"}"#),
        "http://127.0.0.1:9/".into(),
    );
    let err = c.fetch_countries().unwrap_err();
    assert!(
        matches!(
            err,
            Error::UpstreamUnavailable {
                source_api: UpstreamApi::Countries,
                ..
            }
        ),
        "{err:?}"
    );
    assert_eq!(err.http_status(), 503);
}

#[test]
fn garbage_body_is_malformed() {
    let c = client(
        "http://127.0.0.1:9/".into(),
        serve_once("200 OK", "<html>not json</html>"),
    );
    let err = c.fetch_exchange_rates().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UpstreamMalformed);
    assert_eq!(err.http_status(), 502);
    assert!(err.to_string().contains("exchange-rate API"), "{err}");
}

#[test]
fn refused_connection_is_unavailable() {
    // Bind then drop to get a port nothing listens on.
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let c = client(format!("http://127.0.0.1:{port}/"), String::new());
    let err = c.fetch_countries().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
}
