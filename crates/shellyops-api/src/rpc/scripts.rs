// Script namespace
//
// Script code is transferred in chunks in both directions: `Script.GetCode`
// reports how many bytes are `left` after each read, and `Script.PutCode`
// appends successive slices after the first one replaces the body.

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::Error;
use crate::rpc::client::RpcClient;
use crate::rpc::models::ScriptInfo;

/// Largest code slice sent in a single `Script.PutCode` call.
pub const SCRIPT_CHUNK_SIZE: usize = 1024;

#[derive(Debug, Deserialize)]
struct ScriptList {
    #[serde(default)]
    scripts: Vec<ScriptInfo>,
}

#[derive(Debug, Deserialize)]
struct CodeChunk {
    #[serde(default)]
    data: String,
    #[serde(default)]
    left: u64,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: u32,
}

impl RpcClient {
    /// List all scripts with their enable/running state.
    ///
    /// `Script.List`
    pub async fn list_scripts(&self) -> Result<Vec<ScriptInfo>, Error> {
        let list: ScriptList = self.call("Script.List", None).await?;
        Ok(list.scripts)
    }

    /// Fetch a script's full source, reading chunk by chunk until the
    /// device reports nothing left.
    ///
    /// `Script.GetCode` with `{ id, offset }`
    pub async fn script_code(&self, id: u32) -> Result<String, Error> {
        let mut code = String::new();
        loop {
            let chunk: CodeChunk = self
                .call(
                    "Script.GetCode",
                    Some(json!({ "id": id, "offset": code.len() })),
                )
                .await?;

            if chunk.data.is_empty() && chunk.left > 0 {
                return Err(Error::Protocol {
                    method: "Script.GetCode".into(),
                    message: format!(
                        "empty chunk at offset {} with {} bytes left",
                        code.len(),
                        chunk.left
                    ),
                });
            }
            code.push_str(&chunk.data);

            if chunk.left == 0 {
                break;
            }
        }
        debug!(id, bytes = code.len(), "fetched script code");
        Ok(code)
    }

    /// Replace a script's source, uploading in `SCRIPT_CHUNK_SIZE` slices.
    ///
    /// `Script.PutCode` with `{ id, code, append }`
    pub async fn put_script_code(&self, id: u32, code: &str) -> Result<(), Error> {
        for (i, chunk) in code_chunks(code, SCRIPT_CHUNK_SIZE).into_iter().enumerate() {
            let _: Value = self
                .call(
                    "Script.PutCode",
                    Some(json!({ "id": id, "code": chunk, "append": i > 0 })),
                )
                .await?;
        }
        debug!(id, bytes = code.len(), "uploaded script code");
        Ok(())
    }

    /// Create an empty script, returning the device-assigned id.
    ///
    /// `Script.Create`
    pub async fn create_script(&self, name: &str) -> Result<u32, Error> {
        let created: Created = self
            .call("Script.Create", Some(json!({ "name": name })))
            .await?;
        debug!(id = created.id, name, "created script");
        Ok(created.id)
    }

    /// Set a script's name and enable flag.
    ///
    /// `Script.SetConfig`
    pub async fn set_script_config(&self, id: u32, name: &str, enable: bool) -> Result<(), Error> {
        let _: Value = self
            .call(
                "Script.SetConfig",
                Some(json!({ "id": id, "config": { "name": name, "enable": enable } })),
            )
            .await?;
        Ok(())
    }

    /// `Script.Start`
    pub async fn start_script(&self, id: u32) -> Result<(), Error> {
        let _: Value = self.call("Script.Start", Some(json!({ "id": id }))).await?;
        Ok(())
    }

    /// `Script.Stop`
    pub async fn stop_script(&self, id: u32) -> Result<(), Error> {
        let _: Value = self.call("Script.Stop", Some(json!({ "id": id }))).await?;
        Ok(())
    }

    /// `Script.Delete`
    pub async fn delete_script(&self, id: u32) -> Result<(), Error> {
        let _: Value = self.call("Script.Delete", Some(json!({ "id": id }))).await?;
        Ok(())
    }
}

/// Split `code` into slices of at most `max` bytes without cutting a
/// UTF-8 sequence. Empty input yields one empty slice so the device body is
/// still replaced.
pub(crate) fn code_chunks(code: &str, max: usize) -> Vec<&str> {
    if code.is_empty() {
        return vec![""];
    }

    let mut chunks = Vec::new();
    let mut rest = code;
    while !rest.is_empty() {
        let mut end = rest.len().min(max);
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            // `max` smaller than one character; emit the character whole.
            end = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }
        let (head, tail) = rest.split_at(end);
        chunks.push(head);
        rest = tail;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_respect_size_and_char_boundaries() {
        let code = "let a = 'é';";
        let chunks = code_chunks(code, 10);
        assert_eq!(chunks.concat(), code);
        assert!(chunks.iter().all(|c| c.len() <= 10));
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn empty_code_is_one_empty_chunk() {
        assert_eq!(code_chunks("", SCRIPT_CHUNK_SIZE), vec![""]);
    }

    #[test]
    fn short_code_is_single_chunk() {
        assert_eq!(code_chunks("print(1)", SCRIPT_CHUNK_SIZE), vec!["print(1)"]);
    }
}
