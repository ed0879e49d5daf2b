//! `agentchain key`: bearer keys for the HTTP surface.

use agentchain_core::AppState;

pub async fn create(state: &AppState, owner: &str) -> Result<String, String> {
    let key = state
        .api_key_store
        .create(owner)
        .await
        .map_err(|e| e.to_string())?;
    println!("{}", key.key);
    Ok(key.key)
}

pub async fn revoke(state: &AppState, key: &str) -> Result<(), String> {
    let revoked = state
        .api_key_store
        .revoke(key)
        .await
        .map_err(|e| e.to_string())?;
    if !revoked {
        return Err("Key not found".to_string());
    }
    println!("Key revoked");
    Ok(())
}
