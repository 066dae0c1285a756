//! Clinical drawing database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{ClinicalDrawing, DrawingCategory};

impl Database {
    /// Insert a drawing for an existing consultation.
    pub fn insert_drawing(&self, drawing: &ClinicalDrawing) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO clinical_drawings (
                drawing_id, consultation_id, name, category, image, description, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                drawing.drawing_id,
                drawing.consultation_id,
                drawing.name,
                drawing.category.as_str(),
                drawing.image,
                drawing.description,
                drawing.created_at,
            ],
        )?;
        Ok(())
    }

    /// Get a drawing by ID.
    pub fn get_drawing(&self, drawing_id: &str) -> DbResult<Option<ClinicalDrawing>> {
        self.conn
            .query_row(
                r#"
                SELECT drawing_id, consultation_id, name, category, image, description, created_at
                FROM clinical_drawings
                WHERE drawing_id = ?
                "#,
                [drawing_id],
                row_to_drawing,
            )
            .optional()?
            .transpose()
    }

    /// List drawings of a consultation in creation order.
    pub fn list_drawings(&self, consultation_id: &str) -> DbResult<Vec<ClinicalDrawing>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT drawing_id, consultation_id, name, category, image, description, created_at
            FROM clinical_drawings
            WHERE consultation_id = ?
            ORDER BY created_at, rowid
            "#,
        )?;

        let rows = stmt.query_map([consultation_id], row_to_drawing)?;

        let mut drawings = Vec::new();
        for row in rows {
            drawings.push(row??);
        }
        Ok(drawings)
    }

    /// Delete a drawing.
    pub fn delete_drawing(&self, drawing_id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM clinical_drawings WHERE drawing_id = ?", [drawing_id])?;
        Ok(rows_affected > 0)
    }
}

fn row_to_drawing(row: &Row<'_>) -> rusqlite::Result<DbResult<ClinicalDrawing>> {
    let category: String = row.get(3)?;
    let Some(category) = DrawingCategory::parse(&category) else {
        return Ok(Err(DbError::Constraint(format!(
            "Unknown drawing category: {}",
            category
        ))));
    };

    Ok(Ok(ClinicalDrawing {
        drawing_id: row.get(0)?,
        consultation_id: row.get(1)?,
        name: row.get(2)?,
        category,
        image: row.get(4)?,
        description: row.get(5)?,
        created_at: row.get(6)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Consultation, Patient};
    use chrono::NaiveDate;

    fn setup_db() -> (Database, String) {
        let db = Database::open_in_memory().unwrap();
        let patient = Patient::new("Ana".into());
        db.insert_patient(&patient).unwrap();
        let consultation = Consultation::new(
            patient.local_id,
            NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
        );
        db.insert_consultation(&consultation).unwrap();
        (db, consultation.consultation_id)
    }

    #[test]
    fn test_insert_and_list() {
        let (db, consultation_id) = setup_db();

        let mut first = ClinicalDrawing::new(consultation_id.clone(), "Fundus OD".into());
        first.category = DrawingCategory::RightEye;
        first.image = Some(vec![0x89, 0x50, 0x4e, 0x47]);
        let second = ClinicalDrawing::new(consultation_id.clone(), "Sketch".into());

        db.insert_drawing(&first).unwrap();
        db.insert_drawing(&second).unwrap();

        let drawings = db.list_drawings(&consultation_id).unwrap();
        assert_eq!(drawings.len(), 2);
        assert_eq!(drawings[0].name, "Fundus OD");
        assert_eq!(drawings[0].category, DrawingCategory::RightEye);
        assert_eq!(drawings[0].image.as_deref(), Some(&[0x89, 0x50, 0x4e, 0x47][..]));
        assert_eq!(drawings[1].category, DrawingCategory::Other);
    }

    #[test]
    fn test_drawing_requires_consultation() {
        let db = Database::open_in_memory().unwrap();
        let drawing = ClinicalDrawing::new("missing".into(), "Sketch".into());
        assert!(db.insert_drawing(&drawing).is_err());
    }

    #[test]
    fn test_delete_drawing() {
        let (db, consultation_id) = setup_db();
        let drawing = ClinicalDrawing::new(consultation_id, "Sketch".into());
        db.insert_drawing(&drawing).unwrap();

        assert!(db.delete_drawing(&drawing.drawing_id).unwrap());
        assert!(db.get_drawing(&drawing.drawing_id).unwrap().is_none());
    }
}
