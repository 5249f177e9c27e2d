//! Collective operations between the workers of one run.
//!
//! Every worker calls the same sequence of collectives. Rank 0 coordinates: it is the source of
//! `broadcast` and `distribute` and the sink of `collect`.
use std::any::Any;
use std::sync::mpsc::{
    self,
    Receiver,
    Sender,
};

use shared::{
    Result,
    bail,
    ensure,
};

use crate::error::AssignError;


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerContext {
    pub rank:       usize,
    pub world_size: usize,
}


impl WorkerContext {
    pub fn is_root(&self) -> bool { self.rank == 0 }
}


pub trait Communicator {
    fn context(&self) -> WorkerContext;

    /// Rank 0 passes `Some(value)`, every rank gets a copy of it.
    fn broadcast<T: Clone + Send + 'static>(&self, value: Option<T>) -> Result<T>;

    /// Rank 0 passes one value per rank, rank `r` gets the `r`-th one.
    fn distribute<T: Send + 'static>(&self, values: Option<Vec<T>>) -> Result<T>;

    /// Rank 0 gets the values of every rank ordered by rank, the other ranks get `None`.
    fn collect<T: Send + 'static>(&self, value: T) -> Result<Option<Vec<T>>>;

    fn barrier(&self) -> Result<()> {
        self.collect(())?;
        self.broadcast(Some(()))
    }
}


type Message = Box<dyn Any + Send>;


enum Link {
    Root {
        down: Vec<Sender<Message>>,
        up:   Vec<Receiver<Message>>,
    },
    Worker {
        down: Receiver<Message>,
        up:   Sender<Message>,
    },
}


/// Workers living in the same process, one thread each, connected by channels.
///
/// Dropping the coordinator makes every pending call of the workers fail with
/// [`AssignError::Aborted`], and dropping a worker makes the coordinator fail with
/// [`AssignError::WorkerFailed`]. Nobody waits forever.
pub struct LocalComm {
    ctx:  WorkerContext,
    link: Link,
}


impl LocalComm {
    /// Communicators of a world of `world_size` workers, ordered by rank.
    pub fn world(world_size: usize) -> Result<Vec<Self>> {
        ensure!(world_size >= 1, "A world holds at least one worker.");

        let mut root_down = Vec::with_capacity(world_size - 1);
        let mut root_up   = Vec::with_capacity(world_size - 1);
        let mut workers   = Vec::with_capacity(world_size - 1);

        for rank in 1 .. world_size {
            let (down_tx, down_rx) = mpsc::channel::<Message>();
            let (up_tx, up_rx)     = mpsc::channel::<Message>();
            root_down.push(down_tx);
            root_up.push(up_rx);
            workers.push(Self {
                ctx:  WorkerContext { rank, world_size },
                link: Link::Worker { down: down_rx, up: up_tx },
            });
        }

        let root = Self {
            ctx:  WorkerContext { rank: 0, world_size },
            link: Link::Root { down: root_down, up: root_up },
        };

        Ok(std::iter::once(root).chain(workers).collect())
    }

    fn worker_failed(rank: usize) -> AssignError {
        AssignError::WorkerFailed { rank, reason: "worker exited without reporting".to_string() }
    }

    fn aborted(&self) -> AssignError {
        AssignError::Aborted { rank: self.ctx.rank }
    }

    fn unpack<T: 'static>(&self, msg: Message) -> Result<T> {
        match msg.downcast::<T>() {
            Ok(v) => Ok(*v),
            Err(_) => bail!("Rank {} received a message of unexpected type, collectives are out of order.", self.ctx.rank),
        }
    }

    fn send_up(&self, up: &Sender<Message>, msg: Message) -> Result<()> {
        up.send(msg).map_err(|_| self.aborted())?;
        Ok(())
    }

    fn recv_down<T: 'static>(&self, down: &Receiver<Message>) -> Result<T> {
        let msg = down.recv().map_err(|_| self.aborted())?;
        self.unpack(msg)
    }
}


impl Communicator for LocalComm {
    fn context(&self) -> WorkerContext { self.ctx }

    fn broadcast<T: Clone + Send + 'static>(&self, value: Option<T>) -> Result<T> {
        match &self.link {
            Link::Root { down, .. } => {
                let value = match value {
                    Some(v) => v,
                    None => bail!("Rank 0 must provide the value to broadcast."),
                };
                for (i, tx) in down.iter().enumerate() {
                    tx.send(Box::new(value.clone())).map_err(|_| Self::worker_failed(i + 1))?;
                }
                Ok(value)
            },
            Link::Worker { down, .. } => self.recv_down(down),
        }
    }

    fn distribute<T: Send + 'static>(&self, values: Option<Vec<T>>) -> Result<T> {
        match &self.link {
            Link::Root { down, .. } => {
                let values = match values {
                    Some(v) => v,
                    None => bail!("Rank 0 must provide the values to distribute."),
                };
                ensure!(values.len() == self.ctx.world_size,
                        "Got {} values to distribute over {} workers.", values.len(), self.ctx.world_size);

                let mut iter = values.into_iter();
                let own = iter.next()
                    .ok_or_else(|| shared::anyhow::anyhow!("Nothing to distribute."))?;
                for (i, (tx, v)) in down.iter().zip(iter).enumerate() {
                    tx.send(Box::new(v)).map_err(|_| Self::worker_failed(i + 1))?;
                }
                Ok(own)
            },
            Link::Worker { down, .. } => self.recv_down(down),
        }
    }

    fn collect<T: Send + 'static>(&self, value: T) -> Result<Option<Vec<T>>> {
        match &self.link {
            Link::Root { up, .. } => {
                let mut ret = Vec::with_capacity(self.ctx.world_size);
                ret.push(value);
                for (i, rx) in up.iter().enumerate() {
                    let msg = rx.recv().map_err(|_| Self::worker_failed(i + 1))?;
                    ret.push(self.unpack(msg)?);
                }
                Ok(Some(ret))
            },
            Link::Worker { up, .. } => {
                self.send_up(up, Box::new(value))?;
                Ok(None)
            },
        }
    }
}
