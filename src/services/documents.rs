use std::path::Path;

use uuid::Uuid;

use crate::{
    clock::Clock,
    db::Store,
    error::{AppError, AppResult},
    models::document::{Document, NewDocument, RegisterDocumentRequest},
    services::{
        profiles::ProfileService,
        roles::Caller,
        validation::{required_text, MAX_NAME_LEN},
    },
};

const MAX_CONTENT_TYPE_LEN: usize = 128;

pub struct DocumentService;

impl DocumentService {
    /// Records a file the client already put in object storage.
    pub async fn register(
        store: &dyn Store,
        clock: &Clock,
        caller: &Caller,
        req: RegisterDocumentRequest,
    ) -> AppResult<Document> {
        let title = required_text("Title", &req.title, MAX_NAME_LEN)?;
        if req.file_name.trim().is_empty() || req.storage_path.trim().is_empty() {
            return Err(AppError::bad_request("File name and storage path are required"));
        }
        if req.size_bytes < 0 {
            return Err(AppError::bad_request("Size cannot be negative"));
        }

        // Keep only the final path component of whatever the client sent.
        let file_name = Path::new(req.file_name.trim())
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document")
            .to_string();

        let content_type = req
            .content_type
            .filter(|ct| !ct.trim().is_empty())
            .unwrap_or_else(|| mime_guess::from_path(&file_name).first_or_octet_stream().to_string());
        if content_type.len() > MAX_CONTENT_TYPE_LEN {
            return Err(AppError::bad_request(format!("Content type must be at most {MAX_CONTENT_TYPE_LEN} characters")));
        }

        ProfileService::ensure(store, caller).await?;

        let document = store
            .create_document(
                NewDocument {
                    uploader_id: caller.user_id,
                    school_id: caller.school_id(),
                    title,
                    file_name,
                    storage_path: req.storage_path,
                    content_type,
                    size_bytes: req.size_bytes,
                },
                clock.now(),
            )
            .await?;

        tracing::info!(document_id = %document.id, uploader_id = %caller.user_id, "document registered");
        Ok(document)
    }

    /// The caller's own documents, plus the school's when the caller is staff.
    pub async fn list(store: &dyn Store, caller: &Caller) -> AppResult<Vec<Document>> {
        let school = caller.school_id().filter(|id| caller.can_manage_students(*id));
        store.list_documents(caller.user_id, school).await
    }

    pub async fn delete(store: &dyn Store, caller: &Caller, id: Uuid) -> AppResult<()> {
        let document = store
            .get_document(id)
            .await?
            .ok_or_else(|| AppError::not_found("Document not found"))?;

        let is_admin = document.school_id.is_some_and(|s| caller.is_admin_of(s));
        if document.uploader_id != caller.user_id && !is_admin {
            return Err(AppError::forbidden("Only the uploader or an administrator can delete this document"));
        }

        if !store.delete_document(id).await? {
            return Err(AppError::not_found("Document not found"));
        }
        tracing::info!(document_id = %id, deleted_by = %caller.user_id, "document deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::user::UserType;
    use crate::services::roles::ResolvedRole;

    fn member(school_id: Uuid, user_type: UserType) -> Caller {
        Caller {
            user_id: Uuid::new_v4(),
            email: "someone@lincoln.edu".into(),
            role: Some(ResolvedRole { user_type, school_id, is_supervisor: false, student_status: None }),
        }
    }

    fn request(file_name: &str, content_type: Option<&str>) -> RegisterDocumentRequest {
        RegisterDocumentRequest {
            title: "Worksheet".into(),
            file_name: file_name.into(),
            storage_path: format!("uploads/{file_name}"),
            size_bytes: 2048,
            content_type: content_type.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_content_type_is_guessed() {
        let store = MemoryStore::new();
        let clock = Clock::system();
        let student = member(Uuid::new_v4(), UserType::Student);

        let pdf = DocumentService::register(&store, &clock, &student, request("../../notes.pdf", None)).await.unwrap();
        assert_eq!(pdf.content_type, "application/pdf");
        assert_eq!(pdf.file_name, "notes.pdf");

        let unknown = DocumentService::register(&store, &clock, &student, request("blob.zzzz", None)).await.unwrap();
        assert_eq!(unknown.content_type, "application/octet-stream");

        let explicit = DocumentService::register(&store, &clock, &student, request("a.txt", Some("text/markdown")))
            .await
            .unwrap();
        assert_eq!(explicit.content_type, "text/markdown");
    }

    #[tokio::test]
    async fn test_visibility_and_deletion() {
        let store = MemoryStore::new();
        let clock = Clock::system();
        let school = Uuid::new_v4();
        let student = member(school, UserType::Student);
        let classmate = member(school, UserType::Student);
        let teacher = member(school, UserType::Teacher);
        let admin = member(school, UserType::SchoolAdmin);

        let doc = DocumentService::register(&store, &clock, &student, request("essay.docx", None)).await.unwrap();

        assert_eq!(DocumentService::list(&store, &student).await.unwrap().len(), 1);
        assert!(DocumentService::list(&store, &classmate).await.unwrap().is_empty());
        assert_eq!(DocumentService::list(&store, &teacher).await.unwrap().len(), 1);

        let err = DocumentService::delete(&store, &teacher, doc.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        DocumentService::delete(&store, &admin, doc.id).await.unwrap();
        let err = DocumentService::delete(&store, &student, doc.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
