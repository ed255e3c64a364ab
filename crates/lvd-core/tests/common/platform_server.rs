//! Minimal HTTP/1.1 server impersonating the SSO provider and the learning
//! platform on one origin, for integration tests.
//!
//! Login sets a session cookie in `spLoginProcess.php`; every platform page
//! behind it renders a login form when the cookie is missing. One request per
//! connection (`Connection: close`).

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub const SESSION_COOKIE: &str = "MoodleSession=s3ss10n";

/// Body served for the lecture's direct media file.
pub fn media_body() -> Vec<u8> {
    (0u8..=250).cycle().take(48 * 1024).collect()
}

/// Body of the course's only file material; served to logged-in clients.
pub const SYLLABUS: &[u8] = b"%PDF-1.4 syllabus";

pub struct PlatformServer {
    /// Base URL without trailing slash, e.g. `http://127.0.0.1:12345`.
    pub base: String,
    hits: Arc<Mutex<HashMap<String, usize>>>,
}

impl PlatformServer {
    /// Number of requests seen for a path (query string included).
    pub fn hits(&self, path_and_query: &str) -> usize {
        self.hits
            .lock()
            .unwrap()
            .get(path_and_query)
            .copied()
            .unwrap_or(0)
    }
}

pub fn start() -> PlatformServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let base = format!("http://127.0.0.1:{port}");
    let hits = Arc::new(Mutex::new(HashMap::new()));
    let (srv_base, srv_hits) = (base.clone(), Arc::clone(&hits));
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let base = srv_base.clone();
            let hits = Arc::clone(&srv_hits);
            thread::spawn(move || handle(stream, &base, &hits));
        }
    });
    PlatformServer { base, hits }
}

struct Request {
    method: String,
    target: String,
    cookie: String,
    body: String,
}

fn read_request(stream: &mut TcpStream) -> Option<Request> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.lines();
    let mut first = lines.next()?.split_whitespace();
    let method = first.next()?.to_string();
    let target = first.next()?.to_string();

    let mut cookie = String::new();
    let mut content_length = 0usize;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            if name.eq_ignore_ascii_case("cookie") {
                cookie = value.trim().to_string();
            } else if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }
    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end..]).into_owned();
    Some(Request {
        method,
        target,
        cookie,
        body,
    })
}

fn respond(stream: &mut TcpStream, status: &str, extra_headers: &str, body: &[u8]) {
    let head = format!(
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n{extra_headers}\r\n",
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
}

fn html(stream: &mut TcpStream, body: &str) {
    respond(
        stream,
        "200 OK",
        "Content-Type: text/html; charset=utf-8\r\n",
        body.as_bytes(),
    );
}

const LOGIN_FORM: &str = r#"<form action="/login/index.php"><input type="password" name="password"></form>"#;

fn handle(mut stream: TcpStream, base: &str, hits: &Mutex<HashMap<String, usize>>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let Some(req) = read_request(&mut stream) else {
        return;
    };
    *hits.lock().unwrap().entry(req.target.clone()).or_default() += 1;
    let logged_in = req.cookie.contains(SESSION_COOKIE);

    match (req.method.as_str(), req.target.as_str()) {
        ("GET", "/passni/sso/spLogin2.php") => html(
            &mut stream,
            r#"<form><input type="hidden" name="S1" value="s1-token"></form>"#,
        ),
        ("POST", "/sso/PmSSOService") if req.body.contains("S1=s1-token") => html(
            &mut stream,
            r#"<script>var ssoChallenge = "challenge-9"; rsa.setPublic("C0FFEE", "10001");</script>"#,
        ),
        ("POST", "/sso/PmSSOAuthService") if req.body.contains("E2=") => html(
            &mut stream,
            r#"<form><input name="E3" value="e3-ok"><input name="E4" value="e4-ok"><input name="CLTID" value="client"></form>"#,
        ),
        ("POST", "/passni/sso/spLoginData.php") if req.body.contains("E3=e3-ok") => {
            html(&mut stream, "<html>processing</html>")
        }
        ("GET", "/passni/spLoginProcess.php") => respond(
            &mut stream,
            "200 OK",
            &format!("Set-Cookie: {SESSION_COOKIE}; Path=/\r\nContent-Type: text/html\r\n"),
            b"<html>redirecting</html>",
        ),
        ("GET", "/") if logged_in => html(
            &mut stream,
            r#"<nav><a href="/login/logout.php?sesskey=abc">Log out</a></nav>"#,
        ),
        ("GET", "/") => html(&mut stream, r#"<a href="/login/index.php">Log in</a>"#),
        ("GET", _) if !logged_in && !req.target.starts_with("/media/") => {
            html(&mut stream, LOGIN_FORM)
        }
        ("GET", "/local/ubion/user/index.php?year=2024&semester=20") => html(
            &mut stream,
            r#"<table><tbody class="my-course-lists">
                 <tr><td>2024</td><td>20</td><td><a href="/course/view.php?id=7">Computer Networks</a></td><td>Park</td></tr>
               </tbody></table>"#,
        ),
        ("GET", "/course/view.php?id=7") => html(
            &mut stream,
            r#"<ul class="topics">
                 <li id="section-1" class="section"><h3 class="sectionname">Week 1</h3>
                   <ul><li class="activity vod">
                     <div class="activityinstance"><a href="/mod/vod/view.php?id=70"><span class="instancename">Intro 동영상</span></a></div>
                   </li>
                   <li class="activity vod">
                     <div class="activityinstance"><a href="/mod/vod/view.php?id=71"><span class="instancename">Live replay</span></a></div>
                   </li></ul>
                 </li>
                 <li id="section-2" class="section"><h3 class="sectionname">Week 2</h3>
                   <ul><li class="activity resource">
                     <div class="activityinstance"><a href="/mod/resource/view.php?id=80"><span class="instancename">Syllabus.pdf<span class="accesshide"> File</span></span></a></div>
                   </li></ul>
                 </li>
               </ul>"#,
        ),
        ("GET", "/mod/vod/viewer.php?id=70") => html(
            &mut stream,
            &format!(r#"<video><source src="{base}/media/70.mp4" type="video/mp4"></video>"#),
        ),
        ("GET", "/mod/vod/viewer.php?id=71") => html(
            &mut stream,
            &format!(r#"<video><source src="{base}/media/71/index.m3u8" type="application/x-mpegURL"></video>"#),
        ),
        ("GET", "/mod/resource/view.php?id=80") => respond(
            &mut stream,
            "200 OK",
            "Content-Type: application/pdf\r\n",
            SYLLABUS,
        ),
        ("GET", "/media/70.mp4") => respond(
            &mut stream,
            "200 OK",
            "Content-Type: video/mp4\r\n",
            &media_body(),
        ),
        _ => respond(&mut stream, "404 Not Found", "", b"not found"),
    }
}
