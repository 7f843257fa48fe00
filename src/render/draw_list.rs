//! Ordered draw command collections with a traversal cursor.

use std::sync::Arc;

use super::draw_command::DrawCommand;

/// Draw commands of one frame.
///
/// Traversal uses a cursor: [`start`](Self::start) returns the first
/// command, [`next`](Self::next) the following ones, and `None` marks the
/// end. Only one traversal is active at a time; inserting during a
/// traversal is not supported and [`clear`](Self::clear) ends it.
pub trait DrawCommandList: Send {
    /// Append one command.
    fn push(&mut self, command: Arc<DrawCommand>);

    /// Append several commands in order.
    fn insert(&mut self, commands: Vec<Arc<DrawCommand>>) {
        for command in commands {
            self.push(command);
        }
    }

    fn clear(&mut self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Begin a traversal, returning the first command.
    fn start(&mut self) -> Option<Arc<DrawCommand>>;

    /// Advance the traversal. Returns `None` at the end, after which the
    /// cursor stays invalid until the next [`start`](Self::start).
    fn next(&mut self) -> Option<Arc<DrawCommand>>;
}

/// Cursor over a vector of commands.
#[derive(Debug, Default)]
struct Cursor {
    position: Option<usize>,
}

impl Cursor {
    fn start(&mut self, commands: &[Arc<DrawCommand>]) -> Option<Arc<DrawCommand>> {
        let first = commands.first().cloned();
        self.position = first.as_ref().map(|_| 0);
        first
    }

    fn next(&mut self, commands: &[Arc<DrawCommand>]) -> Option<Arc<DrawCommand>> {
        let position = self.position? + 1;
        match commands.get(position) {
            Some(command) => {
                self.position = Some(position);
                Some(command.clone())
            }
            None => {
                self.position = None;
                None
            }
        }
    }
}

/// Draw commands in submission order.
#[derive(Debug, Default)]
pub struct DefaultDrawCommandList {
    commands: Vec<Arc<DrawCommand>>,
    cursor: Cursor,
}

impl DefaultDrawCommandList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: Vec::with_capacity(capacity),
            cursor: Cursor::default(),
        }
    }

    pub fn commands(&self) -> &[Arc<DrawCommand>] {
        &self.commands
    }
}

impl DrawCommandList for DefaultDrawCommandList {
    fn push(&mut self, command: Arc<DrawCommand>) {
        self.commands.push(command);
    }

    fn clear(&mut self) {
        self.commands.clear();
        self.cursor = Cursor::default();
    }

    fn len(&self) -> usize {
        self.commands.len()
    }

    fn start(&mut self) -> Option<Arc<DrawCommand>> {
        self.cursor.start(&self.commands)
    }

    fn next(&mut self) -> Option<Arc<DrawCommand>> {
        self.cursor.next(&self.commands)
    }
}

/// Draw commands grouped by program.
///
/// [`start`](DrawCommandList::start) stably sorts the commands by program
/// identity so consecutive commands share a program. Commands without an
/// own program come first, in submission order.
#[derive(Debug, Default)]
pub struct ProgramSortedDrawCommandList {
    commands: Vec<Arc<DrawCommand>>,
    sorted: bool,
    cursor: Cursor,
}

impl ProgramSortedDrawCommandList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: Vec::with_capacity(capacity),
            sorted: true,
            cursor: Cursor::default(),
        }
    }
}

impl DrawCommandList for ProgramSortedDrawCommandList {
    fn push(&mut self, command: Arc<DrawCommand>) {
        self.commands.push(command);
        self.sorted = false;
    }

    fn clear(&mut self) {
        self.commands.clear();
        self.sorted = true;
        self.cursor = Cursor::default();
    }

    fn len(&self) -> usize {
        self.commands.len()
    }

    fn start(&mut self) -> Option<Arc<DrawCommand>> {
        if !self.sorted {
            self.commands.sort_by_key(|command| command.program_id());
            self.sorted = true;
        }
        self.cursor.start(&self.commands)
    }

    fn next(&mut self) -> Option<Arc<DrawCommand>> {
        self.cursor.next(&self.commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{NullDevice, RenderDevice};
    use crate::buffer::{HostBuffer, VertexBuffer, VertexLayout};
    use crate::resources::{DrawMode, Program, VertexData};
    use glam::Mat4;

    fn command(device: &Arc<dyn RenderDevice>, program: Option<Arc<Program>>) -> Arc<DrawCommand> {
        let data = Arc::new(VertexData::new(
            device.clone(),
            VertexBuffer::new(Box::new(HostBuffer::new()), VertexLayout::new()),
            None,
            DrawMode::Triangles,
        ));
        let mut command = DrawCommand::new(data, Mat4::IDENTITY);
        command.set_program(program);
        Arc::new(command)
    }

    #[test]
    fn test_empty_start_returns_none() {
        let mut list = DefaultDrawCommandList::new();
        assert!(list.start().is_none());
        assert!(list.next().is_none());
    }

    #[test]
    fn test_cursor_visits_all_in_order() {
        let device: Arc<dyn RenderDevice> = Arc::new(NullDevice::new());
        let commands: Vec<_> = (0..3).map(|_| command(&device, None)).collect();
        let mut list = DefaultDrawCommandList::with_capacity(8);
        list.insert(commands.clone());

        let mut visited = vec![list.start().unwrap()];
        for _ in 0..2 {
            visited.push(list.next().unwrap());
        }
        assert!(list.next().is_none());
        assert!(list.next().is_none());
        for (a, b) in visited.iter().zip(&commands) {
            assert!(Arc::ptr_eq(a, b));
        }

        assert!(Arc::ptr_eq(&list.start().unwrap(), &commands[0]));
    }

    #[test]
    fn test_clear_ends_traversal() {
        let device: Arc<dyn RenderDevice> = Arc::new(NullDevice::new());
        let mut list = DefaultDrawCommandList::new();
        list.push(command(&device, None));
        list.push(command(&device, None));
        list.start();
        list.clear();
        assert!(list.next().is_none());
        assert!(list.is_empty());
    }

    #[test]
    fn test_program_sorted_groups_programs() {
        let device: Arc<dyn RenderDevice> = Arc::new(NullDevice::new());
        let a = Arc::new(Program::new(device.clone(), Vec::new()));
        let b = Arc::new(Program::new(device.clone(), Vec::new()));

        let mut list = ProgramSortedDrawCommandList::new();
        list.push(command(&device, Some(b.clone())));
        list.push(command(&device, Some(a.clone())));
        list.push(command(&device, Some(b.clone())));
        list.push(command(&device, None));

        let mut ids = Vec::new();
        let mut current = list.start();
        while let Some(command) = current {
            ids.push(command.program_id());
            current = list.next();
        }
        assert_eq!(ids, vec![None, Some(a.id()), Some(b.id()), Some(b.id())]);
    }
}
