//! `text/event-stream` 增量解码
//!
//! 只处理结果流用到的 `event:` 与 `data:` 字段，注释行与其他字段忽略。

/// 一条完整的 SSE 事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// 事件名（缺省为 `message`）
    pub event: String,
    /// 多行 `data:` 以换行拼接
    pub data: String,
}

/// 按块喂入字节，按空行切分出事件
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// 已统一为 `\n` 行尾的文本
    buf: String,
    pending_bytes: Vec<u8>,
    /// 块末尾的 `\r`：要等下一块才知道它是 CRLF 的一半还是单独的 CR
    pending_cr: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一块数据，返回本次新凑齐的事件
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        // 多字节字符可能被拆在两个块之间
        self.pending_bytes.extend_from_slice(chunk);
        let valid_up_to = match std::str::from_utf8(&self.pending_bytes) {
            Ok(s) => s.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            // 真正的非法字节不再等待后续块，直接按替换字符处理
            Err(_) => self.pending_bytes.len(),
        };
        let rest = self.pending_bytes.split_off(valid_up_to);
        let mut text = String::with_capacity(self.pending_bytes.len() + 1);
        if std::mem::take(&mut self.pending_cr) {
            text.push('\r');
        }
        text.push_str(&String::from_utf8_lossy(&self.pending_bytes));
        self.pending_bytes = rest;
        if text.ends_with('\r') {
            text.pop();
            self.pending_cr = true;
        }
        // 行尾可以是 CRLF、LF 或单独的 CR
        self.buf
            .push_str(&text.replace("\r\n", "\n").replace('\r', "\n"));

        let mut events = Vec::new();
        while let Some(idx) = self.buf.find("\n\n") {
            let block: String = self.buf.drain(..idx + 2).collect();
            if let Some(ev) = parse_block(&block) {
                events.push(ev);
            }
        }
        events
    }

    /// 流结束时冲刷最后一个未以空行结尾的事件
    pub fn finish(&mut self) -> Option<SseEvent> {
        if std::mem::take(&mut self.pending_cr) {
            self.buf.push('\n');
        }
        let block = std::mem::take(&mut self.buf);
        parse_block(&block)
    }
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();
    for line in block.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }
    if event.is_none() && data.is_empty() {
        return None;
    }
    Some(SseEvent {
        event: event.unwrap_or_else(|| "message".to_string()),
        data: data.join("\n"),
    })
}
