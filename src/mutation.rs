//! Add / edit / delete flows. Every transition is a pure function that may
//! emit an [`Effect`]; the model turns effects into backend commands.

use tracing::trace;

use crate::company::{Company, Field, FieldErrors, validate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmKind {
    Delete,
    Edit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit { id: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyForm {
    pub mode: FormMode,
    pub draft: Company,
    pub focus: usize,
    pub errors: FieldErrors,
}

impl CompanyForm {
    pub fn create() -> Self {
        CompanyForm {
            mode: FormMode::Create,
            draft: Company::draft(),
            focus: 0,
            errors: FieldErrors::new(),
        }
    }

    pub fn edit(id: u64, company: Company) -> Self {
        CompanyForm {
            mode: FormMode::Edit { id },
            draft: company,
            focus: 0,
            errors: FieldErrors::new(),
        }
    }

    pub fn title(&self) -> &'static str {
        match self.mode {
            FormMode::Create => "Add New Company",
            FormMode::Edit { .. } => "Edit Company",
        }
    }

    pub fn focused(&self) -> Field {
        Field::COLUMNS[self.focus % Field::COLUMNS.len()]
    }

    pub fn focus_next(&mut self) {
        self.focus = (self.focus + 1) % Field::COLUMNS.len();
    }

    pub fn focus_prev(&mut self) {
        self.focus = (self.focus + Field::COLUMNS.len() - 1) % Field::COLUMNS.len();
    }

    /// Editing a field clears its validation error.
    pub fn set_field(&mut self, field: Field, value: String) {
        self.draft.set_value(field, value);
        self.errors.remove(&field);
    }

    /// Step through the focused field's suggestion list. Returns the new value.
    pub fn cycle_suggestion(&mut self, forward: bool) -> Option<String> {
        let field = self.focused();
        let options = field.suggestions();
        if options.is_empty() {
            return None;
        }
        let current = self.draft.value(field);
        let next = match options.iter().position(|o| *o == current) {
            Some(pos) if forward => (pos + 1) % options.len(),
            Some(pos) => (pos + options.len() - 1) % options.len(),
            None if forward => 0,
            None => options.len() - 1,
        };
        let value = options[next].to_string();
        self.set_field(field, value.clone());
        Some(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Flow {
    #[default]
    Idle,
    Confirm {
        kind: ConfirmKind,
        company: Company,
    },
    Form(CompanyForm),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    RequestDelete(Company),
    RequestEdit(Company),
    RequestCreate,
    Confirm,
    Cancel,
    Submit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Create(Company),
    Update { id: u64, company: Company },
    Delete(u64),
    /// Refused locally, nothing is sent.
    Reject(String),
}

impl Flow {
    pub fn step(self, event: FlowEvent) -> (Flow, Option<Effect>) {
        trace!("Flow step {:?} <- {:?}", self.name(), event);
        match (self, event) {
            (Flow::Idle, FlowEvent::RequestDelete(company)) => (
                Flow::Confirm {
                    kind: ConfirmKind::Delete,
                    company,
                },
                None,
            ),
            (Flow::Idle, FlowEvent::RequestEdit(company)) => (
                Flow::Confirm {
                    kind: ConfirmKind::Edit,
                    company,
                },
                None,
            ),
            (Flow::Idle, FlowEvent::RequestCreate) => (Flow::Form(CompanyForm::create()), None),
            (Flow::Confirm { kind, company }, FlowEvent::Confirm) => match (kind, company.id) {
                (ConfirmKind::Delete, Some(id)) => (Flow::Idle, Some(Effect::Delete(id))),
                (ConfirmKind::Edit, Some(id)) => (Flow::Form(CompanyForm::edit(id, company)), None),
                (_, None) => (
                    Flow::Idle,
                    Some(Effect::Reject(format!(
                        "\"{}\" has no id assigned by the store",
                        company.name
                    ))),
                ),
            },
            (Flow::Confirm { .. } | Flow::Form(_), FlowEvent::Cancel) => (Flow::Idle, None),
            (Flow::Form(mut form), FlowEvent::Submit) => {
                let errors = validate(&form.draft);
                if !errors.is_empty() {
                    form.errors = errors;
                    return (Flow::Form(form), None);
                }
                let mut company = form.draft;
                let effect = match form.mode {
                    FormMode::Create => {
                        company.id = None;
                        Effect::Create(company)
                    }
                    FormMode::Edit { id } => {
                        company.id = Some(id);
                        Effect::Update { id, company }
                    }
                };
                (Flow::Idle, Some(effect))
            }
            (state, _) => (state, None),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Flow::Idle => "idle",
            Flow::Confirm { .. } => "confirm",
            Flow::Form(_) => "form",
        }
    }
}

/// Local copy of the store's records, keyed by `id`.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    rows: Vec<Company>,
}

impl Directory {
    pub fn new(rows: Vec<Company>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Company] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn replace_all(&mut self, rows: Vec<Company>) {
        self.rows = rows;
    }

    pub fn find(&self, id: u64) -> Option<&Company> {
        self.rows.iter().find(|c| c.id == Some(id))
    }

    pub fn apply_created(&mut self, company: Company) {
        self.rows.push(company);
    }

    /// Replace the record with the same id. Returns false when none matched.
    pub fn apply_updated(&mut self, company: Company) -> bool {
        let Some(id) = company.id else {
            return false;
        };
        match self.rows.iter_mut().find(|c| c.id == Some(id)) {
            Some(slot) => {
                *slot = company;
                true
            }
            None => false,
        }
    }

    /// Remove every record with `id`, returning how many were removed.
    pub fn apply_deleted(&mut self, id: u64) -> usize {
        let before = self.rows.len();
        self.rows.retain(|c| c.id != Some(id));
        before - self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn company(id: Option<u64>, name: &str) -> Company {
        Company {
            id,
            name: name.into(),
            location: "Lisbon".into(),
            industry: "Energy".into(),
            employees: "11-50".into(),
            revenue: "<$1M".into(),
            website: "example.org".into(),
            founded: "2010".into(),
            status: "Active".into(),
        }
    }

    #[test]
    fn delete_requires_confirmation() {
        let (flow, effect) = Flow::Idle.step(FlowEvent::RequestDelete(company(Some(4), "Acme")));
        assert!(effect.is_none());
        assert!(matches!(flow, Flow::Confirm { kind: ConfirmKind::Delete, .. }));

        let (flow, effect) = flow.step(FlowEvent::Confirm);
        assert_eq!(flow, Flow::Idle);
        assert_eq!(effect, Some(Effect::Delete(4)));
    }

    #[test]
    fn cancel_returns_to_idle_without_effect() {
        let (flow, _) = Flow::Idle.step(FlowEvent::RequestDelete(company(Some(4), "Acme")));
        assert_eq!(flow.step(FlowEvent::Cancel), (Flow::Idle, None));
        let (flow, _) = Flow::Idle.step(FlowEvent::RequestCreate);
        assert_eq!(flow.step(FlowEvent::Cancel), (Flow::Idle, None));
    }

    #[test]
    fn edit_opens_prefilled_form_and_updates_by_id() {
        let globex = company(Some(9), "Globex");
        let (flow, _) = Flow::Idle.step(FlowEvent::RequestEdit(globex.clone()));
        let (flow, effect) = flow.step(FlowEvent::Confirm);
        assert!(effect.is_none());
        let Flow::Form(mut form) = flow else {
            panic!("expected form");
        };
        assert_eq!(form.title(), "Edit Company");
        assert_eq!(form.draft, globex);

        form.set_field(Field::Name, "Globex Ltd".into());
        let (flow, effect) = Flow::Form(form).step(FlowEvent::Submit);
        assert_eq!(flow, Flow::Idle);
        match effect {
            Some(Effect::Update { id, company }) => {
                assert_eq!(id, 9);
                assert_eq!(company.id, Some(9));
                assert_eq!(company.name, "Globex Ltd");
            }
            other => panic!("unexpected effect {other:?}"),
        }
    }

    #[test]
    fn invalid_submit_keeps_form_open() {
        let (flow, _) = Flow::Idle.step(FlowEvent::RequestCreate);
        let (flow, effect) = flow.step(FlowEvent::Submit);
        assert!(effect.is_none());
        let Flow::Form(mut form) = flow else {
            panic!("expected form");
        };
        assert_eq!(form.errors.len(), 7);
        assert!(!form.errors.contains_key(&Field::Status));

        form.set_field(Field::Name, "Hooli".into());
        assert!(!form.errors.contains_key(&Field::Name));
        assert_eq!(form.errors.len(), 6);
    }

    #[test]
    fn create_emits_record_without_id() {
        let mut form = CompanyForm::create();
        let filled = company(Some(77), "Initech");
        for field in Field::COLUMNS {
            form.set_field(field, filled.value(field).into_owned());
        }
        let (_, effect) = Flow::Form(form).step(FlowEvent::Submit);
        match effect {
            Some(Effect::Create(c)) => {
                assert_eq!(c.id, None);
                assert_eq!(c.name, "Initech");
            }
            other => panic!("unexpected effect {other:?}"),
        }
    }

    #[test]
    fn record_without_id_is_rejected_locally() {
        let (flow, _) = Flow::Idle.step(FlowEvent::RequestDelete(company(None, "Ghost")));
        let (flow, effect) = flow.step(FlowEvent::Confirm);
        assert_eq!(flow, Flow::Idle);
        assert!(matches!(effect, Some(Effect::Reject(_))));
    }

    #[test]
    fn unrelated_events_are_ignored() {
        assert_eq!(Flow::Idle.step(FlowEvent::Submit), (Flow::Idle, None));
        let (confirm, _) = Flow::Idle.step(FlowEvent::RequestEdit(company(Some(1), "A")));
        let (still, effect) = confirm.clone().step(FlowEvent::RequestCreate);
        assert_eq!(still, confirm);
        assert!(effect.is_none());
    }

    #[test]
    fn suggestions_cycle_both_ways() {
        let mut form = CompanyForm::create();
        form.focus = Field::COLUMNS
            .iter()
            .position(|f| *f == Field::Status)
            .unwrap();
        assert_eq!(form.cycle_suggestion(true).as_deref(), Some("Inactive"));
        assert_eq!(form.cycle_suggestion(true).as_deref(), Some("Active"));
        assert_eq!(form.cycle_suggestion(false).as_deref(), Some("Inactive"));
        form.focus = 0;
        assert_eq!(form.cycle_suggestion(true), None);
    }

    #[test]
    fn directory_updates_by_id() {
        let mut dir = Directory::new(vec![company(Some(1), "A"), company(Some(2), "B")]);
        assert!(dir.apply_updated(company(Some(2), "B2")));
        assert!(!dir.apply_updated(company(Some(5), "X")));
        assert_eq!(dir.find(2).map(|c| c.name.as_str()), Some("B2"));
        assert_eq!(dir.apply_deleted(1), 1);
        assert_eq!(dir.apply_deleted(1), 0);
        dir.apply_created(company(Some(3), "C"));
        assert_eq!(dir.len(), 2);
    }
}
