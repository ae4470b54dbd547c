use sqlx::SqliteConnection;

// Audit side-table: a snapshot row is written before content edits and when
// the member list shrinks, so moderation can reconstruct prior state.

const SQL_INSERT_EDIT: &str = r#"
INSERT INTO chat_edits (
  edit_id, chat_id, editor_id, title, info, location, participants_snapshot, created_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
"#;

pub struct NewChatEdit<'a> {
    pub edit_id: &'a str,
    pub chat_id: &'a str,
    pub editor_id: &'a str,
    pub title: &'a str,
    pub info: &'a str,
    pub location: Option<&'a str>,
    pub participants_snapshot: &'a str,
    pub now: &'a str,
}

pub async fn insert_edit(conn: &mut SqliteConnection, edit: NewChatEdit<'_>) -> sqlx::Result<()> {
    sqlx::query(SQL_INSERT_EDIT)
        .bind(edit.edit_id)
        .bind(edit.chat_id)
        .bind(edit.editor_id)
        .bind(edit.title)
        .bind(edit.info)
        .bind(edit.location)
        .bind(edit.participants_snapshot)
        .bind(edit.now)
        .execute(conn)
        .await?;
    Ok(())
}
