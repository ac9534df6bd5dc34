use crate::element::ElementRef;

/// Currently selected elements, in selection order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub(crate) elements: Vec<ElementRef>,
}

impl Selection {
    pub fn elements(&self) -> &[ElementRef] {
        &self.elements
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn contains(&self, element: ElementRef) -> bool {
        self.elements.contains(&element)
    }

    pub(crate) fn remove(&mut self, element: ElementRef) {
        self.elements.retain(|e| *e != element);
    }
}
