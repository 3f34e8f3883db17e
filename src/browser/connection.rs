use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::error::{AppResult, BrowserError};

/// 连接到已登录的浏览器并获取列表页
///
/// 优先复用地址以 `listing_url` 开头的已有页面，找不到时新建页面并导航
pub async fn connect_to_browser_and_page(port: u16, listing_url: &str) -> AppResult<(Browser, Page)> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);

    let (browser, mut handler) = Browser::connect(&browser_url).await.map_err(|e| {
        error!("连接浏览器失败: {}", e);
        BrowserError::ConnectionFailed {
            port,
            message: e.to_string(),
        }
    })?;
    debug!("浏览器连接成功");

    // 在后台处理浏览器事件
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    let pages = browser.pages().await?;
    debug!("获取到 {} 个页面", pages.len());

    for p in pages.iter() {
        if let Ok(Some(url)) = p.url().await {
            debug!("检查页面: {}", url);
            if url.starts_with(listing_url) {
                info!("✓ 复用已打开的列表页: {}", url);
                return Ok((browser, p.clone()));
            }
        }
    }

    debug!("未找到列表页，创建新页面并导航到: {}", listing_url);
    let page = browser.new_page("about:blank").await.map_err(|e| {
        error!("创建新页面失败: {}", e);
        e
    })?;
    page.goto(listing_url).await.map_err(|e| {
        error!("导航到 {} 失败: {}", listing_url, e);
        BrowserError::NavigationFailed {
            url: listing_url.to_string(),
            message: e.to_string(),
        }
    })?;
    info!("已导航到: {}", listing_url);

    Ok((browser, page))
}
