#![allow(dead_code)]

use std::{
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

use carlot::navigation::RouteChange;
use tokio::sync::broadcast;

/// 收到的请求：方法、路径、请求体
pub type Seen = Arc<Mutex<Vec<(String, String, String)>>>;

pub type Handler = Arc<dyn Fn(&str, &str, &str) -> (u16, String) + Send + Sync>;

/// 启动一个本地 HTTP 服务，每个连接只处理一个请求，应答后关闭连接
pub async fn spawn_server(handler: Handler) -> (u16, Seen) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    tokio::spawn(async move {
        loop {
            let (stream, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            let handler = Arc::clone(&handler);
            let log = Arc::clone(&log);
            tokio::spawn(async move {
                serve(stream, handler, log).await;
            });
        }
    });
    (port, seen)
}

async fn serve(mut stream: TcpStream, handler: Handler, seen: Seen) {
    let mut raw = Vec::new();
    let mut buf = [0u8; 1024];
    let header_end = loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        raw.extend_from_slice(&buf[..n]);
        if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&raw[..header_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while raw.len() < header_end + content_length {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => raw.extend_from_slice(&buf[..n]),
        }
    }
    let body = String::from_utf8_lossy(&raw[header_end..]).to_string();

    let mut request_line = head.lines().next().unwrap_or("").split_whitespace();
    let method = request_line.next().unwrap_or("").to_string();
    let path = request_line.next().unwrap_or("").to_string();
    seen.lock().unwrap().push((method.clone(), path.clone(), body.clone()));

    let (status, payload) = handler(&method, &path, &body);
    let response = format!(
        "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        payload.len(),
        payload
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

/// 在 `root/pages` 与 `root/scripts` 下写入页面文件
pub fn write_page(root: &Path, page: &str, template: &str, script: Option<&str>) {
    std::fs::create_dir_all(root.join("pages")).unwrap();
    std::fs::create_dir_all(root.join("scripts")).unwrap();
    std::fs::write(root.join("pages").join(format!("{}.html", page)), template).unwrap();
    if let Some(script) = script {
        std::fs::write(root.join("scripts").join(format!("{}.js", page)), script).unwrap();
    }
}

/// 取下一条导航事件
pub async fn next_change(receiver: &mut broadcast::Receiver<RouteChange>) -> RouteChange {
    tokio::time::timeout(Duration::from_secs(2), receiver.recv())
        .await
        .expect("no route change published")
        .unwrap()
}

/// 轮询直到条件成立
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}
