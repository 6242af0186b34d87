//! Hub（轮毂/中枢）- WebSocket 服务器
//!
//! 在 `/ws/{game_id}` 上接受游戏客户端连接，按 game_id 路由到注册的 AgentRuntime；
//! 未注册的 game_id 收到 `{"error": "No handler for <id>"}` 后连接关闭。
//! 每个连接一个写任务（独占 WebSocket 写端）、一个 Bridge 和一个 AgentSession。

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message as WsMessage;

use super::bridge::Bridge;
use super::runtime::AgentRuntime;
use super::session::AgentSession;

/// 已注册的游戏 id
pub const VISION_SAFARI: &str = "vision-safari";

/// Hub 配置
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// WebSocket 监听地址
    pub bind_addr: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
        }
    }
}

type Connections = Arc<RwLock<HashMap<String, SocketAddr>>>;

/// Hub（轮毂/中枢）
pub struct Hub {
    config: HubConfig,
    games: HashMap<String, Arc<AgentRuntime>>,
    connections: Connections,
    shutdown: tokio::sync::watch::Sender<bool>,
}

impl Hub {
    pub fn new(config: HubConfig) -> Self {
        let (shutdown_tx, _) = tokio::sync::watch::channel(false);
        Self {
            config,
            games: HashMap::new(),
            connections: Arc::new(RwLock::new(HashMap::new())),
            shutdown: shutdown_tx,
        }
    }

    /// 注册游戏处理器（需在 start 之前调用）
    pub fn with_game(mut self, game_id: impl Into<String>, runtime: Arc<AgentRuntime>) -> Self {
        self.games.insert(game_id.into(), runtime);
        self
    }

    /// 启动网关，返回实际监听地址（bind_addr 端口为 0 时由系统分配）
    pub async fn start(&self) -> Result<SocketAddr, String> {
        let addr: SocketAddr = self
            .config
            .bind_addr
            .parse()
            .map_err(|e| format!("Invalid bind address: {}", e))?;

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| format!("Failed to bind: {}", e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| format!("Failed to read local address: {}", e))?;

        tracing::info!("Gateway listening on ws://{}/ws/{{game_id}}", local_addr);

        let mut shutdown_rx = self.shutdown.subscribe();
        let connections = Arc::clone(&self.connections);
        let games = Arc::new(self.games.clone());

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    result = listener.accept() => {
                        match result {
                            Ok((stream, addr)) => {
                                let connections = Arc::clone(&connections);
                                let games = Arc::clone(&games);
                                tokio::spawn(async move {
                                    if let Err(e) = handle_connection(stream, addr, games, connections).await {
                                        tracing::error!("Connection error from {}: {}", addr, e);
                                    }
                                });
                            }
                            Err(e) => {
                                tracing::error!("Accept error: {}", e);
                            }
                        }
                    }
                }
            }
            tracing::info!("Gateway stopped accepting connections");
        });

        Ok(local_addr)
    }

    /// 停止接受新连接
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    /// 获取活跃连接数
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    games: Arc<HashMap<String, Arc<AgentRuntime>>>,
    connections: Connections,
) -> Result<(), String> {
    let mut path = String::new();
    let ws_stream = tokio_tungstenite::accept_hdr_async(
        stream,
        |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            path = req.uri().path().to_string();
            Ok(resp)
        },
    )
    .await
    .map_err(|e| format!("WebSocket handshake failed: {}", e))?;

    let game_id = path.strip_prefix("/ws/").unwrap_or_default().to_string();
    let connection_id = format!("ws_{}_{}", addr, uuid::Uuid::new_v4());
    let total = {
        let mut conns = connections.write().await;
        conns.insert(connection_id.clone(), addr);
        conns.len()
    };
    tracing::info!(game = %game_id, "New client connected from {}. Total: {}", addr, total);

    let (mut ws_tx, ws_rx) = ws_stream.split();

    let Some(runtime) = games.get(&game_id).cloned() else {
        tracing::warn!(game = %game_id, "No handler registered");
        let error = serde_json::json!({ "error": format!("No handler for {game_id}") });
        let _ = ws_tx.send(WsMessage::Text(error.to_string())).await;
        let _ = ws_tx.close().await;
        unregister(&connections, &connection_id).await;
        return Ok(());
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_tx.send(WsMessage::Text(msg)).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    let bridge = Bridge::new(tx);
    let mut reader = bridge.reader(ws_rx);
    let mut session = AgentSession::new(bridge, runtime);

    loop {
        match reader.next_message().await {
            Ok(frame) => {
                if let Err(e) = session.dispatch(frame).await {
                    tracing::warn!("Dispatch failed: {}", e);
                    break;
                }
            }
            Err(_) => break,
        }
    }

    session.shutdown().await;
    // 释放最后的 Bridge，写任务随出站通道关闭而退出
    drop(session);
    drop(reader);
    let _ = writer.await;

    unregister(&connections, &connection_id).await;
    Ok(())
}

async fn unregister(connections: &Connections, connection_id: &str) {
    let total = {
        let mut conns = connections.write().await;
        conns.remove(connection_id);
        conns.len()
    };
    tracing::info!("Client disconnected. Total: {}", total);
}
