#![allow(dead_code)]

use std::time::Duration;

use evohaus_parking::client::EvohausClient;
use mockito::{Matcher, Mock, ServerGuard};

pub const USERNAME: &str = "R42_max";
pub const PASSWORD: &str = "secret";

pub const METER_TABLE_HTML: &str = include_str!("fixtures/meter_table.html");

/// Client against the mock portal
pub fn client_for(server: &ServerGuard, cache_ttl: Duration) -> EvohausClient {
    EvohausClient::new(
        server.url() + "/",
        USERNAME,
        PASSWORD,
        Duration::from_secs(5),
        cache_ttl,
    )
    .expect("Failed to build client")
}

/// Sign-in form GET + credential POST
pub async fn mock_login(server: &mut ServerGuard) -> (Mock, Mock) {
    let form = server
        .mock("GET", "/signinForm.php")
        .match_query(Matcher::UrlEncoded("mode".into(), "ok".into()))
        .with_status(200)
        .with_header("set-cookie", "PHPSESSID=test-session; path=/")
        .with_body("<form></form>")
        .create_async()
        .await;

    let credentials = server
        .mock("POST", "/signinForm.php")
        .match_query(Matcher::UrlEncoded("mode".into(), "ok".into()))
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("user".into(), USERNAME.into()),
            Matcher::UrlEncoded("passwort".into(), PASSWORD.into()),
        ]))
        .with_status(200)
        .with_body("<html>Willkommen</html>")
        .create_async()
        .await;

    (form, credentials)
}

/// Single-row meter table for stall 042 / tenant 100
pub fn single_meter_html(value: &str) -> String {
    format!(
        "<table><tr><td>kWh</td><td>Verbrauch Strom Stpl.042 TNr 100</td><td> M1 </td><td>x</td><td>{}</td></tr></table>",
        value
    )
}

pub fn any_date_param() -> Matcher {
    Matcher::Regex(r"dateParam=\d{4}-\d{2}-\d{2}".into())
}
